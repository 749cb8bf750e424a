//! Image header sniffing over HTTP byte-range requests.
//!
//! Fetches only the first [`HEADER_LEN`] bytes of an image resource and decodes
//! the format signature plus the logical screen dimensions a GIF declares.
//!
//! # Example
//!
//! ```no_run
//! use sniffer::{HeaderSniffer, HttpSniffer};
//!
//! # async fn example() -> sniffer::Result<()> {
//! let sniffer = HttpSniffer::new()?;
//! let header = sniffer.sniff("https://example.com/cat.gif").await?;
//!
//! if header.is_gif() {
//!     println!("{}x{}", header.width, header.height);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod header;

pub use client::{is_fetchable, HeaderSniffer, HttpSniffer};
pub use error::SniffError;
pub use header::{HeaderInfo, GIF_SIGNATURE, HEADER_LEN};

pub type Result<T> = std::result::Result<T, SniffError>;
