use dom::ElementId;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::messages::{PreloaderMessage, PreloaderStats, WatcherEvent, WatcherStatus};
use crate::error::{PreloaderError, Result};

/// Public interface of the preloader registry.
///
/// Every call is a message to the registry actor, so calls made from any task
/// are applied one at a time in the order they arrive.
#[derive(Clone)]
pub struct PreloaderHandle {
    sender: mpsc::Sender<PreloaderMessage>,
    events: broadcast::Sender<WatcherEvent>,
}

impl PreloaderHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<PreloaderMessage>,
        events: broadcast::Sender<WatcherEvent>,
    ) -> Self {
        Self { sender, events }
    }

    async fn send(&self, msg: PreloaderMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| PreloaderError::ActorStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PreloaderMessage,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| PreloaderError::ActorStopped)
    }

    /// Register every image currently in the document.
    ///
    /// Returns the number of newly tracked elements.
    pub async fn scan(&self) -> Result<usize> {
        self.request(|reply| PreloaderMessage::Scan { reply }).await
    }

    /// Register the given elements. Already tracked elements are skipped.
    ///
    /// Returns the number of newly tracked elements.
    pub async fn register(&self, elements: Vec<ElementId>) -> Result<usize> {
        self.request(|reply| PreloaderMessage::Register { elements, reply })
            .await
    }

    /// Report elements removed from the document.
    pub async fn detach(&self, elements: Vec<ElementId>) -> Result<()> {
        self.send(PreloaderMessage::Detach { elements }).await
    }

    /// Report that `element` finished loading its current source.
    pub async fn load_completed(&self, element: ElementId) -> Result<()> {
        self.send(PreloaderMessage::LoadCompleted { element }).await
    }

    /// Status of the element's watcher, if one is still live.
    pub async fn status(&self, element: ElementId) -> Result<Option<WatcherStatus>> {
        self.request(|reply| PreloaderMessage::Status { element, reply })
            .await
    }

    pub async fn stats(&self) -> Result<PreloaderStats> {
        self.request(|reply| PreloaderMessage::Stats { reply }).await
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.events.subscribe()
    }
}
