//! Book domain entities

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One entry of the loan history returned by `GET /book`, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRecord {
    pub id: i64,
    pub user_name: String,
    pub book_name: String,
    pub is_return: bool,
    /// Server local time, no offset
    pub loaned_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<NaiveDateTime>,
}

impl LoanRecord {
    pub fn is_outstanding(&self) -> bool {
        !self.is_return
    }
}

/// Body of `POST /book`
#[derive(Debug, Clone, Serialize)]
pub struct NewBook<'a> {
    pub name: &'a str,
}

/// Body of `POST /book/loan` and `PUT /book/return`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest<'a> {
    pub user_name: &'a str,
    pub book_name: &'a str,
}
