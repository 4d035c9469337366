//! In-memory port fakes for engine and grouper tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use igitur_core::domain::entry::{Entry, EntryIdentity, EntryKind};
use igitur_core::domain::event::{Event, MediaItem};
use igitur_core::domain::newtypes::{EventId, RemoteId};
use igitur_core::ports::event_source::IEventSource;
use igitur_core::ports::remote_drive::IRemoteDrive;

// ============================================================================
// InMemoryDrive
// ============================================================================

struct Node {
    name: String,
    kind: EntryKind,
    parent: Option<u64>,
    data: Vec<u8>,
    /// Counted as a child but left out of listings, like a poll
    hidden: bool,
}

#[derive(Default)]
struct DriveState {
    next_id: u64,
    nodes: BTreeMap<u64, Node>,
    /// Remaining failures per file name; `u32::MAX` fails forever
    fetch_failures: HashMap<String, u32>,
    upload_failures: HashSet<String>,
    list_failures: HashSet<u64>,
    session_expired: bool,
    rejected: u32,
    delete_failures: HashSet<String>,
    deletes: u32,
    fetches: u32,
    uploads: u32,
    folders_created: u32,
}

/// Remote drive held in memory
///
/// Folder id `1` is the root. Children list in creation order, and
/// duplicate names are allowed like on the real service.
pub struct InMemoryDrive {
    state: Mutex<DriveState>,
}

fn rid(id: u64) -> RemoteId {
    RemoteId::new(id.to_string()).unwrap()
}

fn num(id: &RemoteId) -> u64 {
    id.as_str().parse().unwrap()
}

impl InMemoryDrive {
    pub fn new() -> Self {
        let mut state = DriveState {
            next_id: 2,
            ..Default::default()
        };
        state.nodes.insert(
            1,
            Node {
                name: "root".to_string(),
                kind: EntryKind::Folder,
                parent: None,
                data: Vec::new(),
                hidden: false,
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn root(&self) -> RemoteId {
        rid(1)
    }

    fn insert(&self, parent: &RemoteId, name: &str, kind: EntryKind, data: Vec<u8>) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind,
                parent: Some(num(parent)),
                data,
                hidden: false,
            },
        );
        rid(id)
    }

    pub fn add_folder(&self, parent: &RemoteId, name: &str) -> RemoteId {
        self.insert(parent, name, EntryKind::Folder, Vec::new())
    }

    pub fn add_file(&self, parent: &RemoteId, name: &str, data: &[u8]) -> RemoteId {
        self.insert(parent, name, EntryKind::File, data.to_vec())
    }

    /// A child that is not part of the file tree
    pub fn add_hidden(&self, parent: &RemoteId, name: &str) -> RemoteId {
        let id = self.insert(parent, name, EntryKind::File, Vec::new());
        if let Some(node) = self.state.lock().unwrap().nodes.get_mut(&num(&id)) {
            node.hidden = true;
        }
        id
    }

    /// Fetching `name` fails with a network error `times` times
    pub fn fail_fetch(&self, name: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .fetch_failures
            .insert(name.to_string(), times);
    }

    pub fn fail_upload(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .upload_failures
            .insert(name.to_string());
    }

    /// Every file fetch and delete from now on is rejected as unauthorized
    pub fn expire_session(&self) {
        self.state.lock().unwrap().session_expired = true;
    }

    /// Requests rejected because of an expired session
    pub fn rejected(&self) -> u32 {
        self.state.lock().unwrap().rejected
    }

    /// Deleting an entry named `name` fails with a server error
    pub fn fail_delete(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .delete_failures
            .insert(name.to_string());
    }

    /// Delete requests that succeeded
    pub fn deletes(&self) -> u32 {
        self.state.lock().unwrap().deletes
    }

    fn remove(&self, id: &RemoteId, kind: EntryKind) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.session_expired {
            state.rejected += 1;
            bail!("Unauthorized: deleting {id} returned 401 Unauthorized");
        }
        let target = num(id);
        let name = match state.nodes.get(&target) {
            Some(node) if node.kind == kind => node.name.clone(),
            Some(_) => bail!("Invalid response: {id} is not a {kind:?}"),
            None => bail!("Not found: {id}"),
        };
        if state.delete_failures.contains(&name) {
            bail!("Server error: deleting {id} returned 500");
        }

        let mut doomed = vec![target];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i];
            doomed.extend(
                state
                    .nodes
                    .iter()
                    .filter(|(_, n)| n.parent == Some(parent))
                    .map(|(id, _)| *id),
            );
            i += 1;
        }
        for id in doomed {
            state.nodes.remove(&id);
        }
        state.deletes += 1;
        Ok(())
    }

    pub fn fail_list(&self, folder: &RemoteId) {
        self.state.lock().unwrap().list_failures.insert(num(folder));
    }

    pub fn children_of(&self, parent: &RemoteId) -> Vec<(String, EntryKind)> {
        let parent = num(parent);
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .filter(|n| n.parent == Some(parent))
            .map(|n| (n.name.clone(), n.kind))
            .collect()
    }

    pub fn folder_named(&self, parent: &RemoteId, name: &str) -> Option<RemoteId> {
        let parent = num(parent);
        self.state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .find(|(_, n)| n.parent == Some(parent) && n.kind == EntryKind::Folder && n.name == name)
            .map(|(id, _)| rid(*id))
    }

    pub fn file_data(&self, parent: &RemoteId, name: &str) -> Option<Vec<u8>> {
        let parent = num(parent);
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .find(|n| n.parent == Some(parent) && n.kind == EntryKind::File && n.name == name)
            .map(|n| n.data.clone())
    }

    pub fn uploads(&self) -> u32 {
        self.state.lock().unwrap().uploads
    }

    pub fn fetches(&self) -> u32 {
        self.state.lock().unwrap().fetches
    }

    pub fn folders_created(&self) -> u32 {
        self.state.lock().unwrap().folders_created
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for InMemoryDrive {
    async fn get_folder(&self, id: &RemoteId) -> Result<Entry> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(&num(id)) {
            Some(node) if node.kind == EntryKind::Folder => {
                Ok(Entry::root(node.name.clone(), EntryIdentity::Remote(id.clone())))
            }
            Some(_) => bail!("{id} is not a folder"),
            None => bail!("Not found: {id}"),
        }
    }

    async fn list_folder(&self, id: &RemoteId) -> Result<Vec<Entry>> {
        let parent = num(id);
        let state = self.state.lock().unwrap();
        if state.list_failures.contains(&parent) {
            bail!("Invalid response: listing of {id} is broken");
        }
        state
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(parent) && !n.hidden)
            .map(|(child, n)| -> Result<Entry> {
                let entry = Entry::new(n.name.clone(), n.kind, EntryIdentity::Remote(rid(*child)))?
                    .with_parent(EntryIdentity::Remote(id.clone()));
                Ok(match n.kind {
                    EntryKind::File => entry.with_size(n.data.len() as u64),
                    EntryKind::Folder => entry,
                })
            })
            .collect()
    }

    async fn count_children(&self, id: &RemoteId) -> Result<usize> {
        Ok(self.children_of(id).len())
    }

    async fn fetch_file(&self, id: &RemoteId) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .get(&num(id))
            .ok_or_else(|| anyhow!("Not found: {id}"))?;
        let (name, data) = (node.name.clone(), node.data.clone());

        if state.session_expired {
            state.rejected += 1;
            bail!("Unauthorized: file {id} returned 401 Unauthorized");
        }

        if let Some(remaining) = state.fetch_failures.get_mut(&name) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                bail!("Network error: connection reset by peer");
            }
        }
        state.fetches += 1;
        Ok(data)
    }

    async fn create_folder(&self, parent: &RemoteId, name: &str) -> Result<RemoteId> {
        if let Some(existing) = self.folder_named(parent, name) {
            return Ok(existing);
        }
        let id = self.add_folder(parent, name);
        self.state.lock().unwrap().folders_created += 1;
        Ok(id)
    }

    async fn upload_file(&self, parent: &RemoteId, name: &str, data: Vec<u8>) -> Result<RemoteId> {
        if self.state.lock().unwrap().upload_failures.contains(name) {
            bail!("Invalid response: storage upload returned 403 Forbidden");
        }
        let id = self.add_file(parent, name, &data);
        self.state.lock().unwrap().uploads += 1;
        Ok(id)
    }

    async fn delete_folder(&self, id: &RemoteId) -> Result<()> {
        self.remove(id, EntryKind::Folder)
    }

    async fn delete_file(&self, id: &RemoteId) -> Result<()> {
        self.remove(id, EntryKind::File)
    }
}

// ============================================================================
// InMemoryEvents
// ============================================================================

/// Event source held in memory; media content is the media id's bytes
#[derive(Default)]
pub struct InMemoryEvents {
    events: Vec<Event>,
    media: HashMap<String, Vec<MediaItem>>,
    broken_media: HashSet<String>,
    session_expired: bool,
    fetches: Mutex<u32>,
}

impl InMemoryEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, id: &str, title: &str, start: &str) -> EventId {
        let id = EventId::new(id.to_string()).unwrap();
        self.events.push(Event {
            id: id.clone(),
            title: title.to_string(),
            start: start.to_string(),
        });
        id
    }

    pub fn add_media(&mut self, event: &EventId, media_id: &str, file_name: &str, uploader: &str) {
        self.media
            .entry(event.to_string())
            .or_default()
            .push(MediaItem {
                id: RemoteId::new(media_id.to_string()).unwrap(),
                file_name: file_name.to_string(),
                url: format!("https://cdn.example.com/{media_id}"),
                uploader: uploader.to_string(),
                size: None,
            });
    }

    pub fn break_media_of(&mut self, event: &EventId) {
        self.broken_media.insert(event.to_string());
    }

    /// Media downloads are rejected as unauthorized
    pub fn expire_session(&mut self) {
        self.session_expired = true;
    }

    pub fn fetches(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl IEventSource for InMemoryEvents {
    async fn get_event(&self, id: &EventId) -> Result<Event> {
        self.events
            .iter()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("Not found: event {id}"))
    }

    /// Events starting in `[start, end)`; unparseable dates are always listed
    async fn list_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .events
            .iter()
            .filter(|e| match e.start_date() {
                Ok(date) => date >= start && date < end,
                Err(_) => true,
            })
            .cloned()
            .collect())
    }

    async fn list_media(&self, event_id: &EventId) -> Result<Vec<MediaItem>> {
        if self.broken_media.contains(event_id.as_str()) {
            bail!("Server error: posts of event {event_id} returned 500");
        }
        Ok(self
            .media
            .get(event_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_media(&self, media: &MediaItem) -> Result<Vec<u8>> {
        if self.session_expired {
            bail!("Unauthorized: media {} returned 401 Unauthorized", media.id);
        }
        *self.fetches.lock().unwrap() += 1;
        Ok(media.id.as_str().as_bytes().to_vec())
    }
}
