//! igitur Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Entry`, `SyncReport`, `SessionToken`, `Event`, `MediaItem`
//! - **Port definitions** - Traits for adapters: `IRemoteDrive`, `ILocalTree`,
//!   `ISessionProvider`, `IEventSource`, `IImageCompressor`
//! - **Configuration** - YAML-backed settings shared by the CLI and the engine
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure data and validation with no I/O.
//! Ports define trait interfaces that adapter crates implement; the
//! reconciliation engine in `igitur-sync` drives them.

pub mod config;
pub mod domain;
pub mod ports;
