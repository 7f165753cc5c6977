pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod email_limits;
pub mod error;
pub mod health;
pub mod invitation;
pub mod profile;
pub mod tenant;
pub mod two_factor;

pub use error::{ApiError, ErrorResponse};
