//! Books domain: book registration, loans and returns

pub mod controller;
pub mod domain;
pub mod repository;

pub use controller::LoanDesk;
pub use domain::entities::{LoanRecord, LoanRequest, NewBook};
pub use repository::{BooksApi, BOOK_LOAN_PATH, BOOK_PATH, BOOK_RETURN_PATH};
