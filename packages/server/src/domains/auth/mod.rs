pub mod models;
pub mod service;

pub use models::{TierConfig, User, UserTier};
pub use service::AuthService;
