//! Admin account API
//!
//! Thin typed wrappers over the `/admin` endpoints. Session side effects
//! (identity merge, forced logout) live in the session controller.

use shelfdesk_gateway::{Gateway, Method, RequestError};

use crate::types::{AdminForm, AdminInfo};

pub const ADMIN_PATH: &str = "/admin";
pub const ADMIN_INFO_PATH: &str = "/admin/info";

/// Client for the admin account endpoints
#[derive(Clone)]
pub struct AdminApi {
    gateway: Gateway,
}

impl AdminApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Identity check for the current credential
    pub async fn info(&self) -> Result<AdminInfo, RequestError> {
        self.gateway.get_json(ADMIN_INFO_PATH, &[]).await
    }

    /// Register a new administrator; returns the server's message
    pub async fn join(&self, form: &AdminForm) -> Result<String, RequestError> {
        tracing::info!(email = %form.email, "Registering administrator");
        let response = self
            .gateway
            .send_json(Method::Post, ADMIN_PATH, form)
            .await?;
        Ok(response.text())
    }

    pub async fn update(&self, form: &AdminForm) -> Result<String, RequestError> {
        tracing::info!(email = %form.email, "Updating administrator");
        let response = self.gateway.send_json(Method::Put, ADMIN_PATH, form).await?;
        Ok(response.text())
    }

    pub async fn remove(&self, email: &str) -> Result<String, RequestError> {
        tracing::info!(email = %email, "Deleting administrator");
        let path = format!("{ADMIN_PATH}/{email}");
        let response = self.gateway.request(Method::Delete, &path, &[], None).await?;
        Ok(response.text())
    }
}
