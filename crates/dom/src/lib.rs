//! Document abstraction for the image preloader.
//!
//! The preloader never talks to a concrete DOM. It reads and mutates image
//! elements through the [`Document`] trait and learns about newly inserted
//! images from a stream of [`MutationBatch`]es.
//!
//! ```text
//! ┌──────────────┐  MutationBatch   ┌──────────────┐
//! │ host document│ ───────────────▶ │  preloader   │
//! │  (Document)  │ ◀─────────────── │  registry    │
//! └──────────────┘  wrap / unwrap   └──────────────┘
//! ```
//!
//! [`MemoryDocument`] is an in-memory implementation used by tests and the CLI.

mod document;
mod error;
mod memory;
mod mutation;

pub use document::{Document, ElementId, ReadyState, Size};
pub use error::DomError;
pub use memory::MemoryDocument;
pub use mutation::MutationBatch;

pub type Result<T> = std::result::Result<T, DomError>;
