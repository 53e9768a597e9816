//! In-memory video catalog backed by DashMap.
//!
//! Stands in for the video platform's channel API during development.

use chrono::NaiveDate;
use clickpilot_core::{CoreError, CoreResult, Video, VideoCatalog};
use dashmap::DashMap;
use tracing::info;

pub struct InMemoryCatalog {
    videos: DashMap<String, Video>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            videos: DashMap::new(),
        }
    }

    /// Catalog pre-filled with the demo channel.
    pub fn with_demo_videos() -> Self {
        let catalog = Self::new();
        for video in demo_videos() {
            catalog.insert(video);
        }
        info!(videos = catalog.videos.len(), "Video catalog seeded");
        catalog
    }

    pub fn insert(&self, video: Video) {
        self.videos.insert(video.id.clone(), video);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoCatalog for InMemoryCatalog {
    fn list_videos(&self) -> Vec<Video> {
        let mut videos: Vec<Video> = self.videos.iter().map(|r| r.value().clone()).collect();
        videos.sort_by(|a, b| b.upload_date.cmp(&a.upload_date).then(a.id.cmp(&b.id)));
        videos
    }

    fn get_video(&self, video_id: &str) -> Option<Video> {
        self.videos.get(video_id).map(|r| r.value().clone())
    }

    fn set_live_thumbnail(&self, video_id: &str, image_ref: &str) -> CoreResult<()> {
        let mut entry = self
            .videos
            .get_mut(video_id)
            .ok_or_else(|| CoreError::Catalog(format!("video {video_id} is not in the catalog")))?;
        entry.value_mut().thumbnail = image_ref.to_string();
        info!(video_id, image_ref, "Live thumbnail updated");
        Ok(())
    }
}

fn video(id: &str, title: &str, thumbnail: &str, views: u64, upload: (i32, u32, u32), duration: &str) -> Option<Video> {
    Some(Video {
        id: id.to_string(),
        title: title.to_string(),
        thumbnail: thumbnail.to_string(),
        views,
        upload_date: NaiveDate::from_ymd_opt(upload.0, upload.1, upload.2)?,
        duration: duration.to_string(),
    })
}

fn demo_videos() -> Vec<Video> {
    [
        video("vid001", "How to Master React Hooks in 10 Minutes", "https://i.ytimg.com/vi/O6P86uwfdR0/maxresdefault.jpg", 12_500, (2023, 9, 15), "10:45"),
        video("vid002", "Build a Full-Stack App with Next.js 13", "https://i.ytimg.com/vi/PQoD17_ljss/maxresdefault.jpg", 8_750, (2023, 9, 12), "25:18"),
        video("vid003", "TypeScript Crash Course for Beginners", "https://i.ytimg.com/vi/BCg4U1FzODs/maxresdefault.jpg", 15_200, (2023, 9, 8), "18:32"),
        video("vid004", "CSS Grid Layout Tutorial: Complete Guide", "https://i.ytimg.com/vi/68O6eOGAGqA/maxresdefault.jpg", 7_340, (2023, 9, 1), "14:27"),
        video("vid005", "JavaScript Array Methods Every Developer Must Know", "https://i.ytimg.com/vi/R8rmfD9Y5-c/maxresdefault.jpg", 11_800, (2023, 8, 25), "12:15"),
        // Videos that already have tests in the demo store.
        video("video123", "10 JavaScript Tips Every Developer Should Know", "https://i.ytimg.com/vi/W6NZfCO5SIk/maxresdefault.jpg", 21_400, (2023, 10, 10), "11:02"),
        video("video456", "Build a Full Stack App with React, Node.js and MongoDB", "https://i.ytimg.com/vi/7CqJlxBYj-M/maxresdefault.jpg", 18_900, (2023, 10, 8), "42:10"),
        video("video789", "Learn Python in 1 Hour - Full Beginner's Tutorial", "https://i.ytimg.com/vi/kqtD5dpn9C8/maxresdefault.jpg", 33_150, (2023, 9, 28), "1:02:44"),
        video("video101", "React Hooks Explained: useState, useEffect, useContext", "https://i.ytimg.com/vi/O6P86uwfdR0/maxresdefault.jpg", 16_720, (2023, 9, 18), "22:36"),
    ]
    .into_iter()
    .flatten()
    .collect()
}
