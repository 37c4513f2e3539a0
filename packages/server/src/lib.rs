// Dream Machine Platform - API Core
//
// Control plane for the tiered video-generation API: admission and rate
// limiting, weighted-fair job scheduling, and the asynchronous worker that
// drives jobs to a terminal state.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
