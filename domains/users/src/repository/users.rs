//! User record endpoints

use async_trait::async_trait;
use serde::Serialize;
use shelfdesk_gateway::{decode_body, Gateway, Method, RequestError};

use crate::domain::entities::{PagingType, UserRecord};
use crate::domain::telemetry::CacheTelemetry;
use crate::feed::{Page, PageRequest, PageSource};
use crate::repository::preference::PagingPreference;

pub const USER_PATH: &str = "/user";
pub const USER_COUNT_PATH: &str = "/user/count";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody<'a> {
    name: &'a str,
    age: Option<i32>,
    page_size: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenameUserBody<'a> {
    id: i64,
    name: &'a str,
    page_size: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteUserBody<'a> {
    name: &'a str,
    page_size: u32,
}

/// Client for `/user`
///
/// Mutations carry the page size so the server can evict the cached pages it affects.
#[derive(Clone)]
pub struct UsersApi {
    gateway: Gateway,
    preference: PagingPreference,
}

impl UsersApi {
    pub fn new(gateway: Gateway, preference: PagingPreference) -> Self {
        Self {
            gateway,
            preference,
        }
    }

    /// Fetch one page with an explicit strategy
    pub async fn list(
        &self,
        request: PageRequest,
        paging: PagingType,
    ) -> Result<Page<UserRecord>, RequestError> {
        let mut query = vec![
            ("type", paging.as_str().to_string()),
            ("size", request.size.to_string()),
        ];
        if paging.uses_cursor() {
            if let Some(cursor) = request.cursor {
                query.push(("cursor", cursor.to_string()));
            }
        } else {
            query.push(("page", request.page.to_string()));
        }

        let response = self
            .gateway
            .request(Method::Get, USER_PATH, &query, None)
            .await?;
        let records: Vec<UserRecord> = decode_body(Method::Get, USER_PATH, &response)?;
        let telemetry = CacheTelemetry::from_response(&response);

        tracing::debug!(
            paging = %paging,
            records = records.len(),
            cache = ?telemetry.as_ref().map(|t| t.status),
            "User page received"
        );

        Ok(Page { records, telemetry })
    }

    pub async fn count(&self) -> Result<u64, RequestError> {
        self.gateway.get_json(USER_COUNT_PATH, &[]).await
    }

    /// Returns the server's message
    pub async fn create(
        &self,
        name: &str,
        age: Option<i32>,
        page_size: u32,
    ) -> Result<String, RequestError> {
        tracing::info!(name = %name, "Creating user");
        let body = CreateUserBody {
            name,
            age,
            page_size,
        };
        let response = self.gateway.send_json(Method::Post, USER_PATH, &body).await?;
        Ok(response.text())
    }

    pub async fn rename(&self, id: i64, name: &str, page_size: u32) -> Result<String, RequestError> {
        tracing::info!(id, name = %name, "Renaming user");
        let body = RenameUserBody {
            id,
            name,
            page_size,
        };
        let response = self.gateway.send_json(Method::Put, USER_PATH, &body).await?;
        Ok(response.text())
    }

    pub async fn delete(&self, name: &str, page_size: u32) -> Result<String, RequestError> {
        tracing::info!(name = %name, "Deleting user");
        let body = DeleteUserBody { name, page_size };
        let response = self
            .gateway
            .send_json(Method::Delete, USER_PATH, &body)
            .await?;
        Ok(response.text())
    }
}

#[async_trait]
impl PageSource<UserRecord> for UsersApi {
    /// Uses the persisted paging strategy
    async fn fetch_page(&self, request: PageRequest) -> Result<Page<UserRecord>, RequestError> {
        self.list(request, self.preference.get()).await
    }

    async fn total_count(&self) -> Result<u64, RequestError> {
        self.count().await
    }
}
