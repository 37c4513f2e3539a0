pub mod models;
pub mod service;

pub use models::{AspectRatio, Resolution, Video, VideoStatus, VideoStyle};
pub use service::VideoService;
