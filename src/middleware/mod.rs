pub mod auth;

pub use auth::{AuthenticatedUser, admin_auth};
