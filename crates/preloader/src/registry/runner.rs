use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dom::{Document, ElementId};
use sniffer::{HeaderInfo, HeaderSniffer};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::messages::{PreloaderMessage, PreloaderStats, WatcherEvent, WatcherStatus};
use crate::overlay::PlaceholderOverlay;
use crate::watcher::{ImageWatcher, Transition};

/// A live watcher and its in-flight sniff, if any.
struct WatcherEntry {
    watcher: ImageWatcher,
    sniff: Option<JoinHandle<()>>,
}

/// Registry actor
///
/// Owns the document and every live watcher. Sniffs run on their own tasks
/// and report back through the mailbox, so all document mutation happens on
/// this loop.
pub(crate) struct PreloaderActor<D> {
    document: D,
    sniffer: Arc<dyn HeaderSniffer>,
    overlay: PlaceholderOverlay,
    watchers: HashMap<ElementId, WatcherEntry>,
    /// Elements registered so far; outlives the watcher entries.
    tracked: HashSet<ElementId>,
    sniffs_started: usize,
    receiver: mpsc::Receiver<PreloaderMessage>,
    sender: mpsc::WeakSender<PreloaderMessage>,
    events: broadcast::Sender<WatcherEvent>,
}

impl<D: Document + 'static> PreloaderActor<D> {
    pub fn new(
        document: D,
        sniffer: Arc<dyn HeaderSniffer>,
        overlay: PlaceholderOverlay,
        receiver: mpsc::Receiver<PreloaderMessage>,
        sender: mpsc::WeakSender<PreloaderMessage>,
        events: broadcast::Sender<WatcherEvent>,
    ) -> Self {
        Self {
            document,
            sniffer,
            overlay,
            watchers: HashMap::new(),
            tracked: HashSet::new(),
            sniffs_started: 0,
            receiver,
            sender,
            events,
        }
    }

    /// Run the actor loop until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("Preloader actor started");

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }

        for entry in self.watchers.values_mut() {
            if let Some(task) = entry.sniff.take() {
                task.abort();
            }
        }
        tracing::info!("Preloader actor stopped");
    }

    fn handle_message(&mut self, msg: PreloaderMessage) {
        match msg {
            PreloaderMessage::Scan { reply } => {
                let images = self.document.images();
                let _ = reply.send(self.register(images));
            }

            PreloaderMessage::Register { elements, reply } => {
                let _ = reply.send(self.register(elements));
            }

            PreloaderMessage::Detach { elements } => {
                for element in elements {
                    self.detach(element);
                }
            }

            PreloaderMessage::LoadCompleted { element } => {
                self.handle_load(element);
            }

            PreloaderMessage::SniffCompleted { element, result } => {
                self.handle_sniff(element, result);
            }

            PreloaderMessage::Status { element, reply } => {
                let _ = reply.send(self.status(element));
            }

            PreloaderMessage::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Create a watcher for every connected, not yet tracked image.
    fn register(&mut self, elements: Vec<ElementId>) -> usize {
        let mut added = 0;

        for element in elements {
            if !self.document.is_image(element) || !self.document.is_connected(element) {
                tracing::trace!("Skipping {}: not a connected image", element);
                continue;
            }
            if !self.tracked.insert(element) {
                continue;
            }
            added += 1;

            let (watcher, transition) = ImageWatcher::start(element, &self.document);
            if transition == Transition::SniffStarted {
                let sniff = Some(self.spawn_sniff(element, watcher.source_url().to_string()));
                self.watchers.insert(element, WatcherEntry { watcher, sniff });
            }
            self.emit(element, transition);
        }

        added
    }

    /// The task holds only a weak sender until the sniff returns.
    fn spawn_sniff(&mut self, element: ElementId, url: String) -> JoinHandle<()> {
        let sender = self.sender.clone();
        let sniffer = Arc::clone(&self.sniffer);
        self.sniffs_started += 1;

        tokio::spawn(async move {
            let result = sniffer.sniff(&url).await;
            let Some(sender) = sender.upgrade() else {
                tracing::trace!("Preloader gone, dropping sniff of {}", url);
                return;
            };
            let _ = sender
                .send(PreloaderMessage::SniffCompleted { element, result })
                .await;
        })
    }

    fn handle_sniff(&mut self, element: ElementId, result: sniffer::Result<HeaderInfo>) {
        let Some(entry) = self.watchers.get_mut(&element) else {
            tracing::debug!("Discarding sniff result for untracked {}", element);
            return;
        };

        entry.sniff = None;
        let transition = entry
            .watcher
            .on_sniff(&mut self.document, &self.overlay, result);
        self.settle(element, transition);
    }

    fn handle_load(&mut self, element: ElementId) {
        let Some(entry) = self.watchers.get_mut(&element) else {
            return;
        };

        let transition = entry.watcher.on_load(&mut self.document, &self.overlay);
        self.settle(element, transition);
    }

    /// Dispose the watcher of an element that is no longer connected.
    ///
    /// A still-connected element was only moved and keeps its watcher.
    fn detach(&mut self, element: ElementId) {
        if self.document.is_connected(element) {
            return;
        }

        self.tracked.remove(&element);
        let Some(mut entry) = self.watchers.remove(&element) else {
            return;
        };

        if let Some(task) = entry.sniff.take() {
            task.abort();
        }
        let transition = entry.watcher.dispose(&mut self.document, &self.overlay);
        self.emit(element, transition);
    }

    /// Publish a transition and drop the watcher once it has nothing left to do.
    fn settle(&mut self, element: ElementId, transition: Transition) {
        if transition.is_terminal() {
            self.watchers.remove(&element);
        }
        self.emit(element, transition);
    }

    fn emit(&self, element: ElementId, transition: Transition) {
        tracing::debug!("Image {} -> {:?}", element, transition);
        // No subscribers is fine.
        let _ = self.events.send(WatcherEvent {
            element,
            transition,
        });
    }

    fn status(&self, element: ElementId) -> Option<WatcherStatus> {
        self.watchers.get(&element).map(|entry| {
            let record = entry.watcher.record();
            WatcherStatus {
                source_url: record.source_url.clone(),
                load_state: record.load_state,
                replay_state: record.replay_state,
                overlay_present: entry.watcher.overlay_present(),
            }
        })
    }

    fn stats(&self) -> PreloaderStats {
        PreloaderStats {
            tracked: self.tracked.len(),
            active: self.watchers.len(),
            overlays: self
                .watchers
                .values()
                .filter(|e| e.watcher.overlay_present())
                .count(),
            sniffs_started: self.sniffs_started,
        }
    }
}
