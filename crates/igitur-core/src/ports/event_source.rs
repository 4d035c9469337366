//! Event source port
//!
//! Read-only access to the calendar and to the media attached to event
//! posts.

use chrono::{DateTime, Utc};

use crate::domain::event::{Event, MediaItem};
use crate::domain::newtypes::EventId;

#[async_trait::async_trait]
pub trait IEventSource: Send + Sync {
    /// Fetch a single event
    async fn get_event(&self, id: &EventId) -> anyhow::Result<Event>;

    /// Events of the global calendar between `start` and `end`
    ///
    /// Birthday pseudo-events are excluded. The order is the service's;
    /// callers sort by parsed start date.
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>>;

    /// All media of all posts of an event, tagged with their uploader
    async fn list_media(&self, event_id: &EventId) -> anyhow::Result<Vec<MediaItem>>;

    /// Fetch the original file of a media item
    async fn fetch_media(&self, media: &MediaItem) -> anyhow::Result<Vec<u8>>;
}
