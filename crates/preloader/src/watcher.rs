//! Per-image state machine.
//!
//! An [`ImageWatcher`] reacts to three inputs: its own construction, the
//! outcome of the header sniff and native load completions. Every input
//! returns a [`Transition`] describing what changed.
//!
//! ```text
//! start ──▶ Inert                         (already loaded / inline source)
//!   │
//!   └──▶ SniffStarted ──▶ NotGif | Inconclusive | MountSkipped
//!             │
//!             └──▶ Mounted ──load──▶ Replaying ──load──▶ Completed
//! ```

use dom::{Document, ElementId, Size};
use sniffer::{is_fetchable, HeaderInfo};

use crate::overlay::{OverlayHandle, PlaceholderOverlay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    NeverReplayed,
    Replaying,
    Complete,
}

/// Why a watcher never issued a sniff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InertReason {
    /// The image had already finished loading when it was registered.
    AlreadyLoaded,
    /// Inline data or another source that cannot be range-fetched.
    NotFetchable,
}

/// Why a GIF sniff did not lead to an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyLoaded,
    Detached,
    MountFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Inert(InertReason),
    SniffStarted,
    NotGif,
    Inconclusive,
    MountSkipped(SkipReason),
    Mounted(Size),
    /// Ordinary load with no overlay to manage.
    Loaded,
    Replaying,
    Completed,
    Disposed,
    Ignored,
}

impl Transition {
    /// Whether the watcher has nothing left to do after this transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Transition::Inert(_)
                | Transition::NotGif
                | Transition::Inconclusive
                | Transition::MountSkipped(_)
                | Transition::Completed
                | Transition::Disposed
        )
    }
}

/// State tracked for one image element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// `src` captured at registration. Never updated afterwards.
    pub source_url: String,
    pub load_state: LoadState,
    pub replay_state: ReplayState,
    /// Present once a sniff succeeded, GIF or not.
    pub header: Option<HeaderInfo>,
}

pub struct ImageWatcher {
    element: ElementId,
    record: ImageRecord,
    overlay: Option<OverlayHandle>,
}

impl ImageWatcher {
    /// Capture the element's source and decide whether it is worth sniffing.
    ///
    /// Returns [`Transition::SniffStarted`] when the caller should sniff
    /// [`ImageWatcher::source_url`], otherwise [`Transition::Inert`].
    pub fn start(element: ElementId, doc: &dyn Document) -> (Self, Transition) {
        let source_url = doc.attribute(element, "src").unwrap_or_default();
        let loaded = doc.ready_state(element).is_complete();

        let watcher = Self {
            element,
            record: ImageRecord {
                source_url,
                load_state: if loaded {
                    LoadState::Loaded
                } else {
                    LoadState::NotLoaded
                },
                replay_state: ReplayState::NeverReplayed,
                header: None,
            },
            overlay: None,
        };

        let transition = if loaded {
            Transition::Inert(InertReason::AlreadyLoaded)
        } else if !is_fetchable(&watcher.record.source_url) {
            Transition::Inert(InertReason::NotFetchable)
        } else {
            Transition::SniffStarted
        };

        (watcher, transition)
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn source_url(&self) -> &str {
        &self.record.source_url
    }

    pub fn record(&self) -> &ImageRecord {
        &self.record
    }

    pub fn overlay_present(&self) -> bool {
        self.overlay.is_some()
    }

    /// React to the sniff result.
    ///
    /// The overlay is mounted only for a `GIF` signature on an image that is
    /// still connected and has not loaded yet, judged at the moment the result
    /// arrives.
    pub fn on_sniff(
        &mut self,
        doc: &mut dyn Document,
        overlay: &PlaceholderOverlay,
        result: sniffer::Result<HeaderInfo>,
    ) -> Transition {
        let header = match result {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!("Sniff of {} inconclusive: {}", self.record.source_url, e);
                return Transition::Inconclusive;
            }
        };

        self.record.header = Some(header);
        if !header.is_gif() {
            return Transition::NotGif;
        }
        if self.overlay.is_some() {
            return Transition::Ignored;
        }
        if !doc.is_connected(self.element) {
            return Transition::MountSkipped(SkipReason::Detached);
        }
        if self.record.load_state == LoadState::Loaded
            || doc.ready_state(self.element).is_complete()
        {
            return Transition::MountSkipped(SkipReason::AlreadyLoaded);
        }

        match overlay.mount(doc, self.element, &header) {
            Ok(handle) => {
                let size = handle.size;
                self.overlay = Some(handle);
                Transition::Mounted(size)
            }
            Err(e) => {
                tracing::warn!("Failed to mount placeholder for {}: {}", self.record.source_url, e);
                Transition::MountSkipped(SkipReason::MountFailed)
            }
        }
    }

    /// React to a native load completion.
    ///
    /// With an overlay mounted, the first completion re-assigns the same `src`
    /// to restart the animation and the second one removes the overlay.
    pub fn on_load(&mut self, doc: &mut dyn Document, overlay: &PlaceholderOverlay) -> Transition {
        self.record.load_state = LoadState::Loaded;

        if self.overlay.is_none() {
            return Transition::Loaded;
        }

        match self.record.replay_state {
            ReplayState::NeverReplayed => {
                self.record.replay_state = ReplayState::Replaying;
                match doc.set_attribute(self.element, "src", &self.record.source_url) {
                    Ok(()) => Transition::Replaying,
                    Err(e) => {
                        tracing::warn!("Failed to restart {}: {}", self.record.source_url, e);
                        self.finish(doc, overlay)
                    }
                }
            }
            // `finish` drops the overlay, so `Complete` never reaches here.
            ReplayState::Replaying | ReplayState::Complete => self.finish(doc, overlay),
        }
    }

    /// Tear down after the element left the document.
    pub fn dispose(&mut self, doc: &mut dyn Document, overlay: &PlaceholderOverlay) -> Transition {
        self.remove_overlay(doc, overlay);
        Transition::Disposed
    }

    fn finish(&mut self, doc: &mut dyn Document, overlay: &PlaceholderOverlay) -> Transition {
        self.record.replay_state = ReplayState::Complete;
        self.remove_overlay(doc, overlay);
        Transition::Completed
    }

    fn remove_overlay(&mut self, doc: &mut dyn Document, overlay: &PlaceholderOverlay) {
        if let Some(handle) = self.overlay.take() {
            if let Err(e) = overlay.unmount(doc, &handle) {
                tracing::warn!(
                    "Failed to remove placeholder for {}: {}",
                    self.record.source_url,
                    e
                );
            }
        }
    }
}
