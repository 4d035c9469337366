//! Calendar and event media endpoints
//!
//! The global calendar is the only way to find events by date. Media are
//! not attached to events directly: an event has posts, and every post
//! has its own media list, uploaded by the post's creator.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use igitur_core::domain::event::{Event, MediaItem};
use igitur_core::domain::newtypes::{EventId, RemoteId};
use igitur_core::ports::event_source::IEventSource;

use crate::client::GaudeamClient;
use crate::drive::deserialize_id;

/// Calendar entries with this fragment in their URL are member birthdays
const BIRTHDAY_URL_MARKER: &str = "personal_records";

// ============================================================================
// Wire types
// ============================================================================

/// Entry of `/global_calendar.json`, also the shape of `/api/v1/events/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start: String,
    #[serde(default)]
    pub url: String,
}

impl CalendarEntry {
    pub fn is_birthday(&self) -> bool {
        self.url.contains(BIRTHDAY_URL_MARKER)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPost {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub creator: PostCreator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostCreator {
    pub full_name: String,
}

/// Entry of `/api/v1/posts/{id}/event_media`
#[derive(Debug, Clone, Deserialize)]
pub struct EventMedia {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub uploaded_file: UploadedFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub original: OriginalVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginalVersion {
    pub url: String,
}

/// Calendar query boundary, always midnight UTC of the given day
fn calendar_bound(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT00:00:00Z").to_string()
}

// ============================================================================
// Requests
// ============================================================================

impl GaudeamClient {
    /// Raw global calendar between two days, birthdays included
    pub async fn global_calendar(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEntry>> {
        let path = format!(
            "/global_calendar.json?start={}&end={}&timeZone=UTC",
            calendar_bound(start),
            calendar_bound(end)
        );
        self.get_json(&path).await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<CalendarEntry> {
        self.get_json(&format!("/api/v1/events/{event_id}"))
            .await
            .with_context(|| format!("Failed to fetch event {event_id}"))
    }

    pub async fn event_posts(&self, event_id: &str) -> Result<Vec<EventPost>> {
        self.get_json(&format!("/api/v1/events/{event_id}/posts"))
            .await
            .with_context(|| format!("Failed to fetch posts of event {event_id}"))
    }

    pub async fn post_media(&self, post_id: &str) -> Result<Vec<EventMedia>> {
        self.get_json(&format!("/api/v1/posts/{post_id}/event_media"))
            .await
            .with_context(|| format!("Failed to fetch media of post {post_id}"))
    }

    /// Absolute URL for a media link that may be instance-relative
    pub fn absolute_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.base_url(), url)
        } else {
            url.to_string()
        }
    }
}

// ============================================================================
// GaudeamEventSource
// ============================================================================

/// `IEventSource` adapter for one Gaudeam instance
pub struct GaudeamEventSource {
    client: GaudeamClient,
}

impl GaudeamEventSource {
    pub fn new(client: GaudeamClient) -> Self {
        Self { client }
    }
}

fn entry_to_event(entry: CalendarEntry) -> Result<Event> {
    let id = EventId::new(entry.id.clone())
        .with_context(|| format!("Calendar entry has an invalid id {:?}", entry.id))?;
    Ok(Event {
        id,
        title: entry.title,
        start: entry.start,
    })
}

fn media_to_item(media: EventMedia, uploader: &str) -> Option<MediaItem> {
    let id = match RemoteId::new(media.id.clone()) {
        Ok(id) => id,
        Err(e) => {
            warn!(id = %media.id, error = %e, "Ignoring media with invalid id");
            return None;
        }
    };
    Some(MediaItem {
        id,
        file_name: media.uploaded_file.file_name,
        url: media.uploaded_file.original.url,
        uploader: uploader.to_string(),
        size: media.uploaded_file.file_size,
    })
}

#[async_trait::async_trait]
impl IEventSource for GaudeamEventSource {
    #[instrument(skip(self), fields(event = %id))]
    async fn get_event(&self, id: &EventId) -> Result<Event> {
        entry_to_event(self.client.get_event(id.as_str()).await?)
    }

    #[instrument(skip(self))]
    async fn list_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Event>> {
        let entries = self.client.global_calendar(start, end).await?;
        let total = entries.len();

        let mut events = Vec::with_capacity(total);
        for entry in entries {
            if entry.is_birthday() {
                continue;
            }
            match entry_to_event(entry) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "Ignoring calendar entry"),
            }
        }

        debug!(total, events = events.len(), "Fetched global calendar");
        Ok(events)
    }

    #[instrument(skip(self), fields(event = %event_id))]
    async fn list_media(&self, event_id: &EventId) -> Result<Vec<MediaItem>> {
        let posts = self.client.event_posts(event_id.as_str()).await?;

        let mut items = Vec::new();
        for post in posts {
            let media = self.client.post_media(&post.id).await?;
            debug!(post = %post.id, count = media.len(), "Fetched post media");
            items.extend(
                media
                    .into_iter()
                    .filter_map(|m| media_to_item(m, &post.creator.full_name)),
            );
        }
        Ok(items)
    }

    #[instrument(skip(self, media), fields(media = %media.id))]
    async fn fetch_media(&self, media: &MediaItem) -> Result<Vec<u8>> {
        let url = self.client.absolute_url(&media.url);
        self.client.get_bytes_from_url(&url).await
    }
}
