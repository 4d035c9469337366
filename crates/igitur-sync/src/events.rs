//! Event media downloads
//!
//! Media of an event are laid out one folder per uploader. A date window
//! download adds a folder per event above that:
//!
//! ```text
//! DEST/2025-06-14 Stiftungsfest/Max Mustermann/IMG_0001.JPG
//! ```
//!
//! Each uploader folder is reconciled by the regular engine walk, so event
//! downloads resume and skip exactly like tree downloads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};

use igitur_core::domain::entry::{Entry, EntryIdentity, EntryKind};
use igitur_core::domain::event::{
    event_folder_name, sanitize_component, Event, GalleryGroup, MediaItem,
};
use igitur_core::domain::newtypes::{EventId, LocalPath, RemoteId};
use igitur_core::domain::report::{FailureKind, SyncReport};
use igitur_core::ports::event_source::IEventSource;

use crate::engine::{is_auth_error, with_retry, ReconciliationEngine};
use crate::tree::SourceTree;
use crate::SyncError;

/// Outcome of one event of a window download
#[derive(Debug, Clone)]
pub struct EventSyncReport {
    pub event: Event,
    /// Folder the event's media went to; `None` if it was never created
    pub folder: Option<String>,
    pub report: SyncReport,
    /// Why the event was skipped or stopped early
    pub error: Option<String>,
}

impl EventSyncReport {
    fn skipped(event: Event, reason: impl Into<String>) -> Self {
        Self {
            event,
            folder: None,
            report: SyncReport::new(),
            error: Some(reason.into()),
        }
    }
}

/// Groups media by uploader, in first-seen order of the folder names
///
/// Uploaders whose names sanitize to the same folder share one group.
pub fn group_by_uploader(media: Vec<MediaItem>) -> Vec<GalleryGroup> {
    let mut groups: Vec<GalleryGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for item in media {
        let folder = sanitize_component(&item.uploader);
        let slot = *index.entry(folder).or_insert_with(|| {
            groups.push(GalleryGroup::new(item.uploader.clone()));
            groups.len() - 1
        });
        groups[slot].items.push(item);
    }
    groups
}

/// Folder names for events, disambiguating shared names by event id
///
/// Among events with the same computed name the lowest id keeps it; the
/// others get `"<name> (<id>)"`. Returned in input order.
pub fn assign_folder_names(named: &[(&Event, String)]) -> Vec<String> {
    let mut by_name: BTreeMap<&str, Vec<&EventId>> = BTreeMap::new();
    for (event, name) in named {
        by_name.entry(name.as_str()).or_default().push(&event.id);
    }
    let first: HashMap<&str, &EventId> = by_name
        .into_iter()
        .filter_map(|(name, ids)| {
            ids.into_iter()
                .min_by(|a, b| a.sort_key().cmp(&b.sort_key()))
                .map(|id| (name, id))
        })
        .collect();

    named
        .iter()
        .map(|(event, name)| {
            if first.get(name.as_str()) == Some(&&event.id) {
                name.clone()
            } else {
                format!("{name} ({})", event.id)
            }
        })
        .collect()
}

/// First calendar day of a window and the end of its calendar query
///
/// # Errors
/// `SyncError::InvalidWindow` if the window reaches past the representable
/// date range
fn window_bounds(now: DateTime<Utc>, days: u32) -> Result<(NaiveDate, DateTime<Utc>), SyncError> {
    let out_of_range = || SyncError::InvalidWindow(format!("{days} days before {now} is out of range"));
    let first_day = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(out_of_range)?
        .date_naive();
    let end = now
        .checked_add_signed(Duration::days(1))
        .ok_or_else(out_of_range)?;
    Ok((first_day, end))
}

// ============================================================================
// GallerySource
// ============================================================================

/// One uploader's media as a flat source folder
struct GallerySource {
    events: Arc<dyn IEventSource>,
    items: Vec<MediaItem>,
}

impl GallerySource {
    fn item(&self, id: &RemoteId) -> Option<&MediaItem> {
        self.items.iter().find(|m| &m.id == id)
    }
}

#[async_trait::async_trait]
impl SourceTree for GallerySource {
    async fn list(&self, _folder: &EntryIdentity) -> Result<Vec<Entry>> {
        let mut entries = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let name = sanitize_component(&item.file_name);
            match Entry::new(name, EntryKind::File, EntryIdentity::Remote(item.id.clone())) {
                Ok(entry) => entries.push(match item.size {
                    Some(size) => entry.with_size(size),
                    None => entry,
                }),
                Err(e) => warn!(media = %item.id, error = %e, "Ignoring media with unusable name"),
            }
        }
        Ok(entries)
    }

    async fn read(&self, file: &Entry) -> Result<Vec<u8>> {
        let item = file
            .identity
            .as_remote()
            .and_then(|id| self.item(id))
            .ok_or_else(|| anyhow!("{} is not a media item of this gallery", file.identity))?;
        self.events.fetch_media(item).await
    }
}

// ============================================================================
// EventMediaGrouper
// ============================================================================

/// Downloads event media into per-uploader folders
pub struct EventMediaGrouper {
    events: Arc<dyn IEventSource>,
    engine: ReconciliationEngine,
}

impl EventMediaGrouper {
    pub fn new(events: Arc<dyn IEventSource>, engine: ReconciliationEngine) -> Self {
        Self { events, engine }
    }

    /// Downloads one event's media to `DEST/<uploader>/`
    ///
    /// # Errors
    /// `SyncError::InvalidRoot` if `dest` is not an existing directory;
    /// any error fetching the event or its media list
    #[instrument(skip(self), fields(event = %event_id, dest = %dest))]
    pub async fn download_event(&self, event_id: &EventId, dest: &LocalPath) -> Result<SyncReport, SyncError> {
        let root = self.engine.resolve_local_root(dest).await?;
        let event = self.events.get_event(event_id).await?;
        info!(title = %event.title, "Downloading event media");
        Ok(self.download_media_into(&event.id, &root.identity).await?)
    }

    /// Downloads media of every event started in the last `days` days
    ///
    /// Events are processed in start order. A problem with one event is
    /// recorded on its [`EventSyncReport`] and the window continues.
    pub async fn download_events_in_window(
        &self,
        days: u32,
        dest: &LocalPath,
    ) -> Result<Vec<EventSyncReport>, SyncError> {
        self.download_window_at(Utc::now(), days, dest).await
    }

    #[instrument(skip(self), fields(dest = %dest))]
    pub(crate) async fn download_window_at(
        &self,
        now: DateTime<Utc>,
        days: u32,
        dest: &LocalPath,
    ) -> Result<Vec<EventSyncReport>, SyncError> {
        let root = self.engine.resolve_local_root(dest).await?;
        let (first_day, end) = window_bounds(now, days)?;
        let events = self
            .events
            .list_events(first_day.and_time(NaiveTime::MIN).and_utc(), end)
            .await?;

        // Folder names are assigned among all events of a window day,
        // including those that have not started yet, so that an event keeps
        // its folder when a same-named event of that day starts later.
        let mut results = Vec::new();
        let mut dated = Vec::new();
        for event in events {
            match event.start_date() {
                Ok(date) if date.date_naive() >= first_day && date.date_naive() <= now.date_naive() => {
                    dated.push((date, event))
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(event = %event.id, error = %e, "Skipping event with unreadable date");
                    results.push(EventSyncReport::skipped(event, e.to_string()));
                }
            }
        }
        dated.sort_by(|(a_date, a), (b_date, b)| {
            a_date.cmp(b_date).then_with(|| a.id.sort_key().cmp(&b.id.sort_key()))
        });

        let folders = {
            let named: Vec<(&Event, String)> = dated
                .iter()
                .map(|(date, event)| (event, event_folder_name(*date, &event.title)))
                .collect();
            assign_folder_names(&named)
        };
        let started = dated.iter().filter(|(date, _)| *date <= now).count();
        info!(events = started, days, "Events in window");

        let local = self.engine.local_tree();
        for ((date, event), folder) in dated.into_iter().zip(folders) {
            if date > now {
                debug!(event = %event.id, "Event has not started yet");
                continue;
            }
            let folder_id = match self
                .engine
                .ensure_or_create(&local, &root.identity, &folder)
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    warn!(event = %event.id, folder = %folder, error = %e, "Cannot create event folder");
                    results.push(EventSyncReport::skipped(event, format!("{e:#}")));
                    continue;
                }
            };

            info!(event = %event.id, folder = %folder, "Downloading event media");
            let outcome = self.download_media_into(&event.id, &folder_id).await;
            results.push(match outcome {
                Ok(report) => EventSyncReport {
                    event,
                    folder: Some(folder),
                    report,
                    error: None,
                },
                Err(e) => {
                    let e = SyncError::from(e);
                    if matches!(e, SyncError::Auth(_)) {
                        return Err(e);
                    }
                    warn!(event = %event.id, error = %e, "Event media download failed");
                    EventSyncReport {
                        event,
                        folder: Some(folder),
                        report: SyncReport::new(),
                        error: Some(format!("{e:#}")),
                    }
                }
            });
        }
        Ok(results)
    }

    /// Media of `event_id` into per-uploader folders below `dest`
    async fn download_media_into(&self, event_id: &EventId, dest: &EntryIdentity) -> Result<SyncReport> {
        let media = with_retry("list media", self.engine.options(), || {
            self.events.list_media(event_id)
        })
        .await?;
        let groups = group_by_uploader(media);
        let local = self.engine.local_tree();

        let mut report = SyncReport::new();
        for group in groups {
            let folder_id = match self
                .engine
                .ensure_or_create(&local, dest, &group.folder_name)
                .await
            {
                Ok(id) => id,
                Err(e) if is_auth_error(&e) => return Err(e),
                Err(e) => {
                    warn!(uploader = %group.uploader, error = %e, "Cannot create uploader folder");
                    report.record_failure(
                        &group.folder_name,
                        FailureKind::Transfer,
                        format!("{e:#}"),
                    );
                    continue;
                }
            };

            let source = GallerySource {
                events: Arc::clone(&self.events),
                items: group.items,
            };
            let source_root = Entry::root(
                group.uploader.clone(),
                EntryIdentity::Remote(RemoteId::new(event_id.to_string())?),
            );
            let dest_root = Entry::root(group.folder_name.clone(), folder_id);
            let mut walked = self
                .engine
                .sync_tree(&source, &local, &source_root, &dest_root)
                .await?;
            for failure in &mut walked.failures {
                failure.path = format!("{}/{}", group.folder_name, failure.path);
            }
            report.merge(walked);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::TimeZone;
    use tempfile::TempDir;

    use igitur_core::domain::report::CollisionPolicy;

    use super::*;
    use crate::testing::{InMemoryDrive, InMemoryEvents};
    use crate::{EngineOptions, LocalFileSystemAdapter};

    fn grouper(events: InMemoryEvents) -> (EventMediaGrouper, Arc<InMemoryEvents>) {
        let events = Arc::new(events);
        let engine = ReconciliationEngine::new(
            Arc::new(InMemoryDrive::new()),
            Arc::new(LocalFileSystemAdapter::new()),
        )
        .with_options(EngineOptions {
            max_retries: 0,
            retry_base_delay: StdDuration::ZERO,
            collision_policy: CollisionPolicy::Fail,
        });
        (EventMediaGrouper::new(events.clone(), engine), events)
    }

    fn dest(dir: &TempDir) -> LocalPath {
        LocalPath::new(dir.path().to_path_buf()).unwrap()
    }

    fn item(id: &str, uploader: &str) -> MediaItem {
        MediaItem {
            id: RemoteId::new(id.to_string()).unwrap(),
            file_name: format!("{id}.jpg"),
            url: String::new(),
            uploader: uploader.to_string(),
            size: None,
        }
    }

    fn event(id: &str) -> Event {
        Event {
            id: EventId::new(id.to_string()).unwrap(),
            title: "Kneipe".to_string(),
            start: "2025-06-14T18:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_group_by_uploader_merges_equal_folders() {
        let groups = group_by_uploader(vec![
            item("1", "Max"),
            item("2", "Erika"),
            item("3", "Max "),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].folder_name, "Max");
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].folder_name, "Erika");
    }

    #[test]
    fn test_assign_folder_names_lowest_id_keeps_name() {
        let (a, b, c) = (event("20"), event("9"), event("5"));
        let named = vec![
            (&a, "2025-06-14 Kneipe".to_string()),
            (&b, "2025-06-14 Kneipe".to_string()),
            (&c, "2025-06-15 Other".to_string()),
        ];
        assert_eq!(
            assign_folder_names(&named),
            vec!["2025-06-14 Kneipe (20)", "2025-06-14 Kneipe", "2025-06-15 Other"]
        );
    }

    #[tokio::test]
    async fn test_download_event_two_uploaders() {
        let mut events = InMemoryEvents::new();
        let id = events.add_event("101", "Stiftungsfest", "2025-06-14T18:00:00Z");
        events.add_media(&id, "1", "IMG_1.JPG", "Max Mustermann");
        events.add_media(&id, "2", "IMG_2.JPG", "Erika Musterfrau");
        events.add_media(&id, "3", "IMG_3.JPG", "Max Mustermann");
        let (grouper, source) = grouper(events);
        let dir = TempDir::new().unwrap();

        let report = grouper.download_event(&id, &dest(&dir)).await.unwrap();
        assert_eq!((report.transferred, report.failed), (3, 0));
        assert_eq!(std::fs::read(dir.path().join("Max Mustermann/IMG_1.JPG")).unwrap(), b"1");
        assert!(dir.path().join("Max Mustermann/IMG_3.JPG").exists());
        assert!(dir.path().join("Erika Musterfrau/IMG_2.JPG").exists());

        let again = grouper.download_event(&id, &dest(&dir)).await.unwrap();
        assert_eq!((again.transferred, again.skipped), (0, 3));
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_download_event_without_media_is_a_no_op() {
        let mut events = InMemoryEvents::new();
        let id = events.add_event("7", "Empty", "2025-06-14T18:00:00Z");
        let (grouper, _) = grouper(events);
        let dir = TempDir::new().unwrap();

        let report = grouper.download_event(&id, &dest(&dir)).await.unwrap();
        assert_eq!(report, SyncReport::new());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_event_rejects_missing_destination() {
        let mut events = InMemoryEvents::new();
        let id = events.add_event("7", "x", "2025-06-14T18:00:00Z");
        let (grouper, _) = grouper(events);
        let dir = TempDir::new().unwrap();
        let missing = LocalPath::new(dir.path().join("nope")).unwrap();

        let err = grouper.download_event(&id, &missing).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidRoot { .. }));
    }

    #[tokio::test]
    async fn test_window_groups_by_event_and_isolates_problems() {
        let now = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        let mut events = InMemoryEvents::new();
        let a = events.add_event("30", "Kneipe", "2025-06-14T18:00:00Z");
        let b = events.add_event("12", "Kneipe", "2025-06-14T20:00:00.000Z");
        let broken = events.add_event("40", "Ball", "2025-06-18T19:00:00Z");
        events.add_event("41", "Kaputt", "not a date");
        events.add_event("50", "Too old", "2025-05-01T18:00:00Z");
        events.add_event("51", "Future", "2025-06-25T18:00:00Z");
        events.add_media(&a, "1", "a.jpg", "Max");
        events.add_media(&b, "2", "b.jpg", "Erika");
        events.add_media(&broken, "3", "c.jpg", "Max");
        events.break_media_of(&broken);
        let (grouper, _) = grouper(events);
        let dir = TempDir::new().unwrap();

        let results = grouper.download_window_at(now, 7, &dest(&dir)).await.unwrap();

        let bad_date = results.iter().find(|r| r.event.id.as_str() == "41").unwrap();
        assert!(bad_date.folder.is_none());
        assert!(bad_date.error.is_some());

        let folders: Vec<_> = results.iter().filter_map(|r| r.folder.clone()).collect();
        assert_eq!(
            folders,
            vec!["2025-06-14 Kneipe (30)", "2025-06-14 Kneipe", "2025-06-18 Ball"]
        );
        assert!(dir.path().join("2025-06-14 Kneipe (30)/Max/a.jpg").exists());
        assert!(dir.path().join("2025-06-14 Kneipe/Erika/b.jpg").exists());

        let ball = results.iter().find(|r| r.event.id == broken).unwrap();
        assert!(ball.error.as_deref().unwrap().contains("Server error"));
        assert!(!results.iter().any(|r| r.event.id.as_str() == "50" || r.event.id.as_str() == "51"));
    }

    #[tokio::test]
    async fn test_window_folder_names_survive_a_later_start() {
        let mut events = InMemoryEvents::new();
        let late = events.add_event("12", "Kneipe", "2025-06-14T20:00:00Z");
        let early = events.add_event("30", "Kneipe", "2025-06-14T18:00:00Z");
        events.add_media(&early, "1", "early.jpg", "Max");
        events.add_media(&late, "2", "late.jpg", "Max");
        let (grouper, source) = grouper(events);
        let dir = TempDir::new().unwrap();

        let before = Utc.with_ymd_and_hms(2025, 6, 14, 19, 0, 0).unwrap();
        let first = grouper.download_window_at(before, 1, &dest(&dir)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].folder.as_deref(), Some("2025-06-14 Kneipe (30)"));

        let after = Utc.with_ymd_and_hms(2025, 6, 14, 21, 0, 0).unwrap();
        let second = grouper.download_window_at(after, 1, &dest(&dir)).await.unwrap();
        let folders: Vec<_> = second.iter().filter_map(|r| r.folder.clone()).collect();
        assert_eq!(folders, vec!["2025-06-14 Kneipe (30)", "2025-06-14 Kneipe"]);
        assert_eq!(second[0].report.skipped, 1);

        assert!(dir.path().join("2025-06-14 Kneipe (30)/Max/early.jpg").exists());
        assert!(dir.path().join("2025-06-14 Kneipe/Max/late.jpg").exists());
        assert!(!dir.path().join("2025-06-14 Kneipe/Max/early.jpg").exists());
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_window_beyond_date_range_is_an_error() {
        let mut events = InMemoryEvents::new();
        events.add_event("1", "Kneipe", "2025-06-14T18:00:00Z");
        let (grouper, _) = grouper(events);
        let dir = TempDir::new().unwrap();

        let err = grouper
            .download_events_in_window(u32::MAX, &dest(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidWindow(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_window_stops_when_session_expires() {
        let now = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        let mut events = InMemoryEvents::new();
        let a = events.add_event("1", "Kneipe", "2025-06-18T18:00:00Z");
        let b = events.add_event("2", "Ball", "2025-06-19T18:00:00Z");
        events.add_media(&a, "1", "a.jpg", "Max");
        events.add_media(&b, "2", "b.jpg", "Max");
        events.expire_session();
        let (grouper, _) = grouper(events);
        let dir = TempDir::new().unwrap();

        let err = grouper.download_window_at(now, 7, &dest(&dir)).await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert!(!dir.path().join("2025-06-19 Ball").exists());
    }

    #[tokio::test]
    async fn test_window_rerun_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        let mut events = InMemoryEvents::new();
        let a = events.add_event("1", "Kneipe", "2025-06-19T18:00:00Z");
        events.add_media(&a, "1", "a.jpg", "Max");
        let (grouper, source) = grouper(events);
        let dir = TempDir::new().unwrap();

        grouper.download_window_at(now, 3, &dest(&dir)).await.unwrap();
        let second = grouper.download_window_at(now, 3, &dest(&dir)).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].report.skipped, 1);
        assert_eq!(source.fetches(), 1);
    }
}
