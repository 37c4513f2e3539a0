pub mod models;
pub mod service;

pub use models::{AccountResponse, QuotaResponse, UsagePeriod, UsageResponse};
pub use service::AccountService;
