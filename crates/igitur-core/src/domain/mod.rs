//! Domain entities and business logic
//!
//! This module contains the core domain types for igitur:
//! - Newtypes for validated identifiers and local paths
//! - Tree entries shared by the remote and local side
//! - Transfer classification and run reports
//! - Session tokens
//! - Calendar events and their media
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod event;
pub mod newtypes;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use entry::{Entry, EntryIdentity, EntryKind};
pub use errors::DomainError;
pub use event::{
    event_folder_name, parse_event_date, sanitize_component, Event, GalleryGroup, MediaItem,
};
pub use newtypes::*;
pub use report::{
    CleanupReport, CollisionPolicy, FailureKind, SkipDecision, SyncReport, SyncStatus, TransferDirection,
    TransferFailure, TransferTask,
};
pub use session::SessionToken;
