//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the reconciliation
//! engine depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteDrive`] - Remote drive folders and files
//! - [`ILocalTree`] - Local directory tree with atomic writes
//! - [`ISessionProvider`] - Login, persisted session, validation
//! - [`IEventSource`] - Calendar events and their media
//! - [`IImageCompressor`] - Image resampling and re-encoding

pub mod event_source;
pub mod image_compressor;
pub mod local_tree;
pub mod remote_drive;
pub mod session;

pub use event_source::IEventSource;
pub use image_compressor::{CompressionSettings, IImageCompressor};
pub use local_tree::{FileSystemState, ILocalTree};
pub use remote_drive::IRemoteDrive;
pub use session::{ISessionProvider, MemberInfo};
