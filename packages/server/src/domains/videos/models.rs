//! Video resources and their wire-level enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Processing status of a stored video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

/// Output resolution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Hd1080
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::Sd480 => "480p",
            Resolution::Hd720 => "720p",
            Resolution::Hd1080 => "1080p",
            Resolution::Uhd4k => "4k",
        };
        f.write_str(name)
    }
}

/// Aspect ratio options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Classic,
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Wide
    }
}

/// Style presets supported by the generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStyle {
    Cinematic,
    Anime,
    Realistic,
    Artistic,
    Documentary,
}

/// A generated (or in-flight) video owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Duration in seconds.
    pub duration: f64,
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
    pub style: Option<VideoStyle>,
    pub status: VideoStatus,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_id: String,
    pub job_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Video {
    /// Allocate a fresh video id (`vid_` + 12 hex chars).
    pub fn new_id() -> String {
        format!("vid_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
    }
}
