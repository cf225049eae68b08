//! Backend access for the users domain

pub mod preference;
pub mod users;

pub use preference::PagingPreference;
pub use users::{UsersApi, USER_COUNT_PATH, USER_PATH};
