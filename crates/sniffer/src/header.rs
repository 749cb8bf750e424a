//! Header decoding for the GIF logical screen descriptor.

use serde::Serialize;

use crate::error::SniffError;

/// Number of leading bytes requested and inspected.
pub const HEADER_LEN: usize = 10;

/// The 3-byte ASCII fingerprint at the start of every GIF file.
pub const GIF_SIGNATURE: [u8; 3] = *b"GIF";

/// Signature and declared pixel dimensions decoded from the first 10 bytes.
///
/// Width and height are little-endian `u16` fields at offsets 6 and 8, which is
/// where GIF stores its logical screen size. For other formats the values are
/// whatever bytes happen to sit there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    #[serde(serialize_with = "serialize_signature")]
    pub signature: [u8; 3],
    pub width: u16,
    pub height: u16,
}

impl HeaderInfo {
    /// Decode a header from raw bytes.
    ///
    /// Only the first [`HEADER_LEN`] bytes are read; anything shorter is
    /// [`SniffError::Truncated`].
    pub fn parse(bytes: &[u8]) -> Result<Self, SniffError> {
        if bytes.len() < HEADER_LEN {
            return Err(SniffError::Truncated { len: bytes.len() });
        }

        Ok(Self {
            signature: [bytes[0], bytes[1], bytes[2]],
            width: u16::from_le_bytes([bytes[6], bytes[7]]),
            height: u16::from_le_bytes([bytes[8], bytes[9]]),
        })
    }

    /// Whether the signature is exactly `GIF`.
    pub fn is_gif(&self) -> bool {
        self.signature == GIF_SIGNATURE
    }

    /// Signature rendered for display, non-ASCII bytes replaced.
    pub fn signature_str(&self) -> String {
        render_signature(&self.signature)
    }
}

fn render_signature(sig: &[u8; 3]) -> String {
    sig.iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

fn serialize_signature<S: serde::Serializer>(sig: &[u8; 3], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&render_signature(sig))
}
