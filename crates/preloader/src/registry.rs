mod handle;
mod messages;
mod runner;

pub use handle::PreloaderHandle;
pub use messages::{PreloaderStats, WatcherEvent, WatcherStatus};
use runner::PreloaderActor;

use std::sync::Arc;

use dom::Document;
use sniffer::HeaderSniffer;
use tokio::sync::{broadcast, mpsc};

use crate::config::PreloaderConfig;

/// Create the preloader registry for `document`.
///
/// Spawns the registry actor on the current tokio runtime. Nothing is tracked
/// until [`PreloaderHandle::scan`] or [`PreloaderHandle::register`] is called.
/// The actor stops once every handle is dropped.
pub fn create_preloader<D>(
    document: D,
    sniffer: Arc<dyn HeaderSniffer>,
    config: &PreloaderConfig,
) -> PreloaderHandle
where
    D: Document + 'static,
{
    let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
    let (events, _) = broadcast::channel(config.event_capacity.max(1));

    let actor = PreloaderActor::new(
        document,
        sniffer,
        config.overlay(),
        receiver,
        sender.downgrade(),
        events.clone(),
    );

    tokio::spawn(actor.run());

    PreloaderHandle::new(sender, events)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use dom::{ElementId, MemoryDocument, Size};
    use reqwest::Url;
    use sniffer::HttpSniffer;
    use tokio::sync::broadcast::error::RecvError;
    use tokio::sync::broadcast::Receiver;

    use super::*;
    use crate::discovery::spawn_discovery;
    use crate::mocks::{gif_bytes, png_bytes, MockSniffer};
    use crate::watcher::{InertReason, LoadState, ReplayState, SkipReason, Transition};

    fn setup(sniffer: MockSniffer) -> (MemoryDocument, PreloaderHandle, Receiver<WatcherEvent>) {
        let doc = MemoryDocument::new();
        let handle = create_preloader(doc.clone(), Arc::new(sniffer), &PreloaderConfig::default());
        let events = handle.subscribe();
        (doc, handle, events)
    }

    /// Wait for the next transition of `element`, skipping other elements.
    async fn next_transition(
        events: &mut Receiver<WatcherEvent>,
        element: ElementId,
    ) -> Transition {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for transition")
                .expect("event channel closed");
            if event.element == element {
                return event.transition;
            }
        }
    }

    /// Finish loading `element` in the document and deliver the load event.
    async fn load(doc: &MemoryDocument, handle: &PreloaderHandle, element: ElementId) {
        doc.finish_load(element).unwrap();
        handle.load_completed(element).await.unwrap();
    }

    #[tokio::test]
    async fn test_gif_overlay_mounted_before_first_load() {
        let sniffer = MockSniffer::new();
        sniffer.respond("/a.gif", &gif_bytes(100, 50));
        let (doc, handle, mut events) = setup(sniffer);
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        assert_eq!(handle.scan().await.unwrap(), 1);
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);
        assert_eq!(
            next_transition(&mut events, img).await,
            Transition::Mounted(Size::new(100, 50))
        );

        let wrapper = doc.parent(img).unwrap();
        assert_eq!(doc.parent(wrapper), Some(doc.root()));
        assert_eq!(doc.style(wrapper, "width").as_deref(), Some("100px"));
        assert_eq!(doc.style(wrapper, "height").as_deref(), Some("50px"));
        assert_eq!(doc.attribute(img, "width").as_deref(), Some("100"));
        assert_eq!(doc.attribute(img, "height").as_deref(), Some("50"));

        let indicator = doc.children(wrapper)[1];
        assert_eq!(doc.classes(indicator), vec!["preloader-placeholder"]);
        assert_eq!(doc.text(indicator).as_deref(), Some("Loading..."));

        let status = handle.status(img).await.unwrap().unwrap();
        assert!(status.overlay_present);
        assert_eq!(status.load_state, LoadState::NotLoaded);
        assert_eq!(status.replay_state, ReplayState::NeverReplayed);
    }

    #[tokio::test]
    async fn test_replay_cycle_restores_document() {
        let sniffer = MockSniffer::new();
        sniffer.respond("/a.gif", &gif_bytes(100, 50));
        let (doc, handle, mut events) = setup(sniffer);
        let root = doc.root();
        let before = doc.insert_element(root, "p").unwrap();
        let img = doc.insert_image(root, "/a.gif").unwrap();
        let after = doc.insert_element(root, "p").unwrap();
        let original_attributes = doc.attributes(img);

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);
        assert!(matches!(next_transition(&mut events, img).await, Transition::Mounted(_)));

        load(&doc, &handle, img).await;
        assert_eq!(next_transition(&mut events, img).await, Transition::Replaying);
        assert_eq!(doc.src_assignments(img), 1);
        let status = handle.status(img).await.unwrap().unwrap();
        assert!(status.overlay_present);
        assert_eq!(status.replay_state, ReplayState::Replaying);

        load(&doc, &handle, img).await;
        assert_eq!(next_transition(&mut events, img).await, Transition::Completed);
        assert_eq!(doc.src_assignments(img), 1);

        assert_eq!(doc.children(root), vec![before, img, after]);
        let mut expected = original_attributes;
        expected.push(("height".to_string(), "50".to_string()));
        expected.push(("width".to_string(), "100".to_string()));
        expected.sort();
        assert_eq!(doc.attributes(img), expected);

        // The watcher is gone; further loads change nothing.
        assert_eq!(handle.status(img).await.unwrap(), None);
        load(&doc, &handle, img).await;
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.overlays, 0);
        assert_eq!(doc.src_assignments(img), 1);
    }

    #[tokio::test]
    async fn test_png_never_mounts() {
        let sniffer = MockSniffer::new();
        sniffer.respond("/b.png", &png_bytes());
        let (doc, handle, mut events) = setup(sniffer);
        let img = doc.insert_image(doc.root(), "/b.png").unwrap();

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);
        assert_eq!(next_transition(&mut events, img).await, Transition::NotGif);

        load(&doc, &handle, img).await;
        assert_eq!(doc.children(doc.root()), vec![img]);
        assert_eq!(doc.src_assignments(img), 0);
        assert_eq!(handle.stats().await.unwrap().overlays, 0);
    }

    #[tokio::test]
    async fn test_inline_source_is_never_sniffed() {
        let sniffer = MockSniffer::new();
        let (doc, handle, mut events) = setup(sniffer.clone());
        let img = doc
            .insert_image(doc.root(), "data:image/gif;base64,R0lGODlhAQABAAAAACw=")
            .unwrap();

        handle.scan().await.unwrap();
        assert_eq!(
            next_transition(&mut events, img).await,
            Transition::Inert(InertReason::NotFetchable)
        );
        assert!(sniffer.calls().is_empty());
        assert_eq!(handle.stats().await.unwrap().sniffs_started, 0);
    }

    #[tokio::test]
    async fn test_loaded_image_is_never_sniffed() {
        let sniffer = MockSniffer::new();
        sniffer.respond("/a.gif", &gif_bytes(10, 10));
        let (doc, handle, mut events) = setup(sniffer.clone());
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();
        doc.finish_load(img).unwrap();

        handle.scan().await.unwrap();
        assert_eq!(
            next_transition(&mut events, img).await,
            Transition::Inert(InertReason::AlreadyLoaded)
        );
        assert!(sniffer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_network_error_behaves_like_non_gif() {
        // Bind and drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        drop(listener);

        let sniffer = HttpSniffer::new()
            .unwrap()
            .with_base_url(Url::parse(&format!("http://{}/", addr)).unwrap());
        let doc = MemoryDocument::new();
        let handle = create_preloader(doc.clone(), Arc::new(sniffer), &PreloaderConfig::default());
        let mut events = handle.subscribe();
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);
        assert_eq!(next_transition(&mut events, img).await, Transition::Inconclusive);

        load(&doc, &handle, img).await;
        assert_eq!(doc.children(doc.root()), vec![img]);
        assert_eq!(doc.src_assignments(img), 0);
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let sniffer = MockSniffer::new();
        sniffer.respond("/a.gif", &gif_bytes(20, 20));
        let (doc, handle, mut events) = setup(sniffer.clone());
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        assert_eq!(handle.register(vec![img]).await.unwrap(), 1);
        assert_eq!(handle.register(vec![img, img]).await.unwrap(), 0);
        assert_eq!(handle.scan().await.unwrap(), 0);

        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);
        assert!(matches!(next_transition(&mut events, img).await, Transition::Mounted(_)));
        assert_eq!(handle.scan().await.unwrap(), 0);

        let wrapper = doc.parent(img).unwrap();
        assert_eq!(doc.parent(wrapper), Some(doc.root()));
        assert_eq!(sniffer.calls(), vec!["/a.gif".to_string()]);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.tracked, 1);
        assert_eq!(stats.overlays, 1);
        assert_eq!(stats.sniffs_started, 1);

        // One listener: a single load causes a single reload.
        load(&doc, &handle, img).await;
        assert_eq!(next_transition(&mut events, img).await, Transition::Replaying);
        assert_eq!(doc.src_assignments(img), 1);
    }

    #[tokio::test]
    async fn test_non_image_elements_are_ignored() {
        let (doc, handle, _events) = setup(MockSniffer::new());
        let div = doc.insert_element(doc.root(), "div").unwrap();

        assert_eq!(handle.register(vec![div]).await.unwrap(), 0);
        assert_eq!(handle.stats().await.unwrap().tracked, 0);
    }

    #[tokio::test]
    async fn test_sniff_after_first_load_never_mounts() {
        let sniffer = MockSniffer::gated();
        sniffer.respond("/a.gif", &gif_bytes(10, 10));
        let (doc, handle, mut events) = setup(sniffer.clone());
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);

        load(&doc, &handle, img).await;
        assert_eq!(next_transition(&mut events, img).await, Transition::Loaded);

        sniffer.release();
        assert_eq!(
            next_transition(&mut events, img).await,
            Transition::MountSkipped(SkipReason::AlreadyLoaded)
        );
        assert_eq!(doc.children(doc.root()), vec![img]);
        assert_eq!(doc.attribute(img, "width"), None);
        assert_eq!(doc.src_assignments(img), 0);
    }

    #[tokio::test]
    async fn test_detach_discards_pending_sniff() {
        let sniffer = MockSniffer::gated();
        sniffer.respond("/a.gif", &gif_bytes(10, 10));
        let (doc, handle, mut events) = setup(sniffer.clone());
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);

        doc.remove_element(img).unwrap();
        handle.detach(vec![img]).await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::Disposed);

        sniffer.release();
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.overlays, 0);
        assert_eq!(doc.parent(img), None);
        assert_eq!(doc.attribute(img, "width"), None);
    }

    #[tokio::test]
    async fn test_actor_stops_with_sniff_in_flight() {
        let sniffer = MockSniffer::gated();
        sniffer.respond("/a.gif", &gif_bytes(10, 10));
        let (doc, handle, mut events) = setup(sniffer.clone());
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);
        assert_eq!(sniffer.calls(), vec!["/a.gif".to_string()]);

        drop(handle);
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Err(RecvError::Closed) => break,
                    _ => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "actor kept running after its last handle was dropped");
        assert_eq!(doc.children(doc.root()), vec![img]);
    }

    #[tokio::test]
    async fn test_detach_ignores_connected_element() {
        let sniffer = MockSniffer::gated();
        let (doc, handle, mut events) = setup(sniffer);
        let img = doc.insert_image(doc.root(), "/a.gif").unwrap();

        handle.scan().await.unwrap();
        assert_eq!(next_transition(&mut events, img).await, Transition::SniffStarted);

        handle.detach(vec![img]).await.unwrap();
        let status = handle.status(img).await.unwrap();
        assert!(status.is_some());
    }

    #[tokio::test]
    async fn test_discovery_tracks_inserted_and_removed_images() {
        let sniffer = MockSniffer::new();
        sniffer.respond("/late.gif", &gif_bytes(40, 30));
        sniffer.respond("/late.png", &png_bytes());
        let (doc, handle, mut events) = setup(sniffer);
        let mut png_events = handle.subscribe();
        let _discovery = spawn_discovery(doc.observe(), handle.clone());

        let imgs = doc.insert_images(doc.root(), &["/late.gif", "/late.png"]).unwrap();
        let (gif, png) = (imgs[0], imgs[1]);

        assert_eq!(next_transition(&mut events, gif).await, Transition::SniffStarted);
        assert_eq!(
            next_transition(&mut events, gif).await,
            Transition::Mounted(Size::new(40, 30))
        );
        assert_eq!(next_transition(&mut png_events, png).await, Transition::SniffStarted);
        assert_eq!(next_transition(&mut png_events, png).await, Transition::NotGif);

        // Host removes the GIF while its placeholder is up.
        doc.remove_element(gif).unwrap();
        assert_eq!(next_transition(&mut events, gif).await, Transition::Disposed);
        assert_eq!(doc.children(doc.root()), vec![png]);
        assert_eq!(handle.stats().await.unwrap().overlays, 0);
    }
}
