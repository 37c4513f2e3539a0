//! Video resource operations. Every access is owner-checked.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::common::pagination::PageParams;
use crate::common::ApiError;
use crate::domains::auth::User;
use crate::kernel::storage::StorageManager;

use super::models::{Video, VideoStatus};

pub struct VideoService {
    storage: Arc<StorageManager>,
}

impl VideoService {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    /// Fetch a video, enforcing ownership.
    pub fn get_video(&self, video_id: &str, user: &User) -> Result<Video, ApiError> {
        let video = self
            .storage
            .videos
            .get(video_id)
            .ok_or(ApiError::VideoNotFound {
                video_id: video_id.to_string(),
            })?;

        if video.owner_id != user.id {
            return Err(ApiError::PermissionDenied {
                message: "You don't have permission to access this video".to_string(),
                details: Some(json!({ "video_id": video_id })),
            });
        }

        Ok(video)
    }

    /// Owner-scoped listing, newest first, optional status filter.
    pub fn list_videos(
        &self,
        user: &User,
        params: PageParams,
        status: Option<VideoStatus>,
    ) -> (Vec<Video>, usize) {
        let params = params.normalized();
        self.storage.videos.page(
            |video| {
                video.owner_id == user.id
                    && status.map_or(true, |wanted| video.status == wanted)
            },
            |video| video.created_at,
            true,
            params.offset(),
            params.limit(),
        )
    }

    /// Streaming URL for a READY video.
    ///
    /// Videos that are not ready (or have no URL yet) surface as not found
    /// rather than leaking their in-flight state.
    pub fn get_stream_url(&self, video_id: &str, user: &User) -> Result<String, ApiError> {
        let video = self.get_video(video_id, user)?;

        if video.status != VideoStatus::Ready {
            return Err(ApiError::VideoNotFound {
                video_id: video_id.to_string(),
            });
        }

        video.url.ok_or(ApiError::VideoNotFound {
            video_id: video_id.to_string(),
        })
    }

    /// Delete a video owned by the caller.
    pub fn delete_video(&self, video_id: &str, user: &User) -> Result<(), ApiError> {
        self.get_video(video_id, user)?;
        self.storage.videos.remove(video_id);
        info!(video_id = %video_id, "video deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::AuthService;
    use crate::domains::videos::{AspectRatio, Resolution};
    use chrono::Utc;
    use std::collections::HashMap;

    fn ready_video(owner_id: &str) -> Video {
        let id = Video::new_id();
        Video {
            id: id.clone(),
            title: "sunset".to_string(),
            description: None,
            duration: 10.0,
            resolution: Resolution::Hd1080,
            aspect_ratio: AspectRatio::Wide,
            style: None,
            status: VideoStatus::Ready,
            url: Some(format!("https://storage.dreammachine.dev/videos/{id}.mp4")),
            thumbnail_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            owner_id: owner_id.to_string(),
            job_id: None,
            metadata: HashMap::new(),
        }
    }

    fn fixtures() -> (Arc<StorageManager>, VideoService, AuthService) {
        let storage = Arc::new(StorageManager::new(None));
        let videos = VideoService::new(storage.clone());
        (storage, videos, AuthService::new())
    }

    #[test]
    fn test_get_enforces_ownership() {
        let (storage, videos, auth) = fixtures();
        let dev = auth.validate_api_key("dev_test_key").unwrap();
        let free = auth.validate_api_key("free_test_key").unwrap();

        let video = ready_video(&dev.id);
        storage.videos.insert(&video.id, video.clone());

        assert!(videos.get_video(&video.id, &dev).is_ok());
        let error = videos.get_video(&video.id, &free).unwrap_err();
        assert_eq!(error.code(), "AUTH_PERMISSION_DENIED");
    }

    #[test]
    fn test_stream_url_requires_ready() {
        let (storage, videos, auth) = fixtures();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        let mut video = ready_video(&dev.id);
        video.status = VideoStatus::Processing;
        storage.videos.insert(&video.id, video.clone());

        let error = videos.get_stream_url(&video.id, &dev).unwrap_err();
        assert_eq!(error.code(), "VIDEO_NOT_FOUND");

        video.status = VideoStatus::Ready;
        storage.videos.insert(&video.id, video.clone());
        assert!(videos.get_stream_url(&video.id, &dev).unwrap().ends_with(".mp4"));
    }

    #[test]
    fn test_delete_roundtrip() {
        let (storage, videos, auth) = fixtures();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        let video = ready_video(&dev.id);
        storage.videos.insert(&video.id, video.clone());

        videos.delete_video(&video.id, &dev).unwrap();
        let error = videos.get_video(&video.id, &dev).unwrap_err();
        assert_eq!(error.code(), "VIDEO_NOT_FOUND");
    }

    #[test]
    fn test_list_scoped_to_owner() {
        let (storage, videos, auth) = fixtures();
        let dev = auth.validate_api_key("dev_test_key").unwrap();
        let pro = auth.validate_api_key("pro_test_key").unwrap();

        for _ in 0..2 {
            let video = ready_video(&dev.id);
            storage.videos.insert(&video.id, video.clone());
        }
        let other = ready_video(&pro.id);
        storage.videos.insert(&other.id, other.clone());

        let (page, total) = videos.list_videos(&dev, PageParams::default(), None);
        assert_eq!(total, 2);
        assert!(page.iter().all(|video| video.owner_id == dev.id));
    }
}
