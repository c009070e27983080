//! # Fish Common Library
//!
//! Shared code for the animatronic fish:
//! - Error types
//! - Bootstrap configuration loading
//! - Playlist persistence (recently played items and the playback queue)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod playlist;
pub mod time;

pub use error::{Error, Result};
pub use playlist::{ItemType, PlayedItem, PlaylistStore, QueueItem};
