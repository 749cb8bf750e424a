//! Animated GIF preloader.
//!
//! Watches image elements of a [`dom::Document`], sniffs the first bytes of
//! each image source and, for GIFs that are still loading, covers the image
//! with a placeholder until the animation has played through once.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dom::MemoryDocument;
//! use preloader::{create_preloader, spawn_discovery, PreloaderConfig};
//!
//! let config = PreloaderConfig::default();
//! let document = MemoryDocument::new();
//! let sniffer = Arc::new(config.build_sniffer()?);
//!
//! let handle = create_preloader(document.clone(), sniffer, &config);
//! handle.scan().await?;
//! spawn_discovery(document.observe(), handle.clone());
//! ```

mod config;
mod discovery;
mod error;
mod overlay;
mod registry;
mod watcher;

#[cfg(test)]
mod mocks;

pub use config::{PreloaderConfig, DEFAULT_PLACEHOLDER_CLASS, DEFAULT_PLACEHOLDER_TEXT};
pub use discovery::spawn_discovery;
pub use error::{ConfigError, PreloaderError, Result};
pub use overlay::{OverlayHandle, PlaceholderOverlay};
pub use registry::{create_preloader, PreloaderHandle, PreloaderStats, WatcherEvent, WatcherStatus};
pub use watcher::{
    ImageRecord, ImageWatcher, InertReason, LoadState, ReplayState, SkipReason, Transition,
};
