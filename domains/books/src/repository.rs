//! Book and loan endpoints

use shelfdesk_gateway::{Gateway, Method, RequestError};

use crate::domain::entities::{LoanRecord, LoanRequest, NewBook};

pub const BOOK_PATH: &str = "/book";
pub const BOOK_LOAN_PATH: &str = "/book/loan";
pub const BOOK_RETURN_PATH: &str = "/book/return";

/// Client for `/book`; mutations return the server's message
#[derive(Clone)]
pub struct BooksApi {
    gateway: Gateway,
}

impl BooksApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn loans(&self) -> Result<Vec<LoanRecord>, RequestError> {
        self.gateway.get_json(BOOK_PATH, &[]).await
    }

    pub async fn add(&self, name: &str) -> Result<String, RequestError> {
        tracing::info!(book = %name, "Registering book");
        let response = self
            .gateway
            .send_json(Method::Post, BOOK_PATH, &NewBook { name })
            .await?;
        Ok(response.text())
    }

    pub async fn loan(&self, user_name: &str, book_name: &str) -> Result<String, RequestError> {
        tracing::info!(user = %user_name, book = %book_name, "Lending book");
        let body = LoanRequest {
            user_name,
            book_name,
        };
        let response = self
            .gateway
            .send_json(Method::Post, BOOK_LOAN_PATH, &body)
            .await?;
        Ok(response.text())
    }

    pub async fn return_book(
        &self,
        user_name: &str,
        book_name: &str,
    ) -> Result<String, RequestError> {
        tracing::info!(user = %user_name, book = %book_name, "Returning book");
        let body = LoanRequest {
            user_name,
            book_name,
        };
        let response = self
            .gateway
            .send_json(Method::Put, BOOK_RETURN_PATH, &body)
            .await?;
        Ok(response.text())
    }
}
