pub mod account;
pub mod admin;
pub mod dashboard;
pub mod generate;
pub mod health;
pub mod jobs;
pub mod videos;
