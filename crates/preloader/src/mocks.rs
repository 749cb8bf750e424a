//! Scripted sniffer for registry tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sniffer::{HeaderInfo, HeaderSniffer, SniffError};
use tokio::sync::Semaphore;

/// Mock implementation of HeaderSniffer.
///
/// Unknown URLs answer with HTTP 404. A gated sniffer holds every call
/// until [`MockSniffer::release`] lets one through.
#[derive(Clone, Default)]
pub struct MockSniffer {
    responses: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockSniffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Answer sniffs of `url` with these range-response bytes.
    pub fn respond(&self, url: &str, bytes: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    /// Let one held sniff complete.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// URLs sniffed so far (for verification).
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HeaderSniffer for MockSniffer {
    async fn sniff(&self, url: &str) -> sniffer::Result<HeaderInfo> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let bytes = self.responses.lock().unwrap().get(url).cloned();
        match bytes {
            Some(bytes) => HeaderInfo::parse(&bytes),
            None => Err(SniffError::HttpStatus(404)),
        }
    }
}

/// Ten-byte range response of a GIF with the given logical screen size.
pub fn gif_bytes(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = b"GIF89a".to_vec();
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes
}

/// Ten-byte range response of a PNG.
pub fn png_bytes() -> Vec<u8> {
    vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00]
}
