//! Video catalog — the channel's videos that experiments run against.
//!
//! Hosts pass an `Arc<dyn VideoCatalog>` to anything that needs to look up a
//! video or apply a winning thumbnail.

use crate::error::CoreResult;
use crate::types::PublishInstruction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Video metadata as exposed by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    /// Currently live thumbnail.
    pub thumbnail: String,
    pub views: u64,
    pub upload_date: NaiveDate,
    /// Display length, e.g. `10:45`.
    pub duration: String,
}

pub trait VideoCatalog: Send + Sync {
    fn list_videos(&self) -> Vec<Video>;

    fn get_video(&self, video_id: &str) -> Option<Video>;

    /// Replace the live thumbnail of `video_id` with `image_ref`.
    fn set_live_thumbnail(&self, video_id: &str, image_ref: &str) -> CoreResult<()>;
}

impl PublishInstruction {
    /// Deliver this instruction to a catalog.
    pub fn deliver(&self, catalog: &dyn VideoCatalog) -> CoreResult<()> {
        catalog.set_live_thumbnail(&self.subject_ref, &self.image_ref)
    }
}
