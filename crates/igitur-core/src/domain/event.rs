//! Calendar events and their media
//!
//! Events come from the instance's global calendar. Each event carries a
//! list of posts, and each post a list of media uploaded by the post's
//! creator. Downloads group those media by uploader.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{EventId, RemoteId};

/// A calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    /// Start date exactly as the service reported it
    pub start: String,
}

impl Event {
    /// Parsed start date
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDate` if the start string is in none of
    /// the formats the service emits
    pub fn start_date(&self) -> Result<DateTime<Utc>, DomainError> {
        parse_event_date(&self.start)
    }

    /// Destination folder name for this event: `"YYYY-MM-DD <title>"`
    ///
    /// # Errors
    /// Returns error if the start date cannot be parsed
    pub fn folder_name(&self) -> Result<String, DomainError> {
        Ok(event_folder_name(self.start_date()?, &self.title))
    }
}

/// A single photo or video attached to an event post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: RemoteId,
    /// Original file name of the upload
    pub file_name: String,
    /// Absolute URL of the original file
    pub url: String,
    /// Display name of the post creator
    pub uploader: String,
    pub size: Option<u64>,
}

/// Media of one uploader, destined for one subfolder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryGroup {
    pub uploader: String,
    /// Sanitized subfolder name
    pub folder_name: String,
    pub items: Vec<MediaItem>,
}

impl GalleryGroup {
    #[must_use]
    pub fn new(uploader: impl Into<String>) -> Self {
        let uploader = uploader.into();
        let folder_name = sanitize_component(&uploader);
        Self {
            uploader,
            folder_name,
            items: Vec::new(),
        }
    }
}

/// Parses a date in one of the formats the calendar API emits
///
/// Accepted:
/// - `2025-11-02T14:23:45.123Z` (and any RFC 3339 timestamp)
/// - `Sun, 02 Nov 2025 14:23:45 +0000` (RFC 2822)
///
/// # Errors
/// Returns `DomainError::InvalidDate` for anything else
pub fn parse_event_date(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Ok(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(DomainError::InvalidDate(raw.to_string()))
}

/// Folder name for an event starting at `start` with `title`
#[must_use]
pub fn event_folder_name(start: DateTime<Utc>, title: &str) -> String {
    sanitize_component(&format!("{} {}", start.format("%Y-%m-%d"), title.trim()))
}

/// Makes an arbitrary display string usable as a single path component
///
/// Separators and control characters become `-`, surrounding whitespace
/// is trimmed, and names that would be empty or a dot segment become `_`.
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim();

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
