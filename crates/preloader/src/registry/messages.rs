use dom::ElementId;
use sniffer::HeaderInfo;
use tokio::sync::oneshot;

use crate::watcher::{LoadState, ReplayState, Transition};

/// Snapshot of a live watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherStatus {
    pub source_url: String,
    pub load_state: LoadState,
    pub replay_state: ReplayState,
    pub overlay_present: bool,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloaderStats {
    /// Elements registered and not detached since.
    pub tracked: usize,
    /// Watchers still waiting on a sniff or a load.
    pub active: usize,
    /// Overlays currently mounted.
    pub overlays: usize,
    /// Sniff requests issued so far.
    pub sniffs_started: usize,
}

/// A transition of one element's watcher, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherEvent {
    pub element: ElementId,
    pub transition: Transition,
}

pub(crate) enum PreloaderMessage {
    /// Register every image currently in the document.
    Scan { reply: oneshot::Sender<usize> },

    /// Register specific elements; replies with how many were new.
    Register {
        elements: Vec<ElementId>,
        reply: oneshot::Sender<usize>,
    },

    /// Dispose watchers of elements that left the document.
    Detach { elements: Vec<ElementId> },

    /// Native load completion of an element's current source.
    LoadCompleted { element: ElementId },

    /// Result of a sniff task.
    SniffCompleted {
        element: ElementId,
        result: sniffer::Result<HeaderInfo>,
    },

    Status {
        element: ElementId,
        reply: oneshot::Sender<Option<WatcherStatus>>,
    },

    Stats { reply: oneshot::Sender<PreloaderStats> },
}
