//! # Byte Size Accounting
//!
//! The compression search compares every candidate against the byte budget,
//! so size accounting has to be exact and cheap. Binary buffers are measured
//! by length; base64 data URLs (`data:<mime>;base64,<payload>`) are measured
//! from the payload length and its padding, without decoding.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::core::media::MediaType;
use crate::error::{CompressError, CompressResult};

const BASE64_MARKER: &str = ";base64,";

/// Anything whose encoded byte size can be reported without a decode pass.
pub trait EstimateSize {
    /// Size in bytes of the binary image this value represents.
    fn estimate_size(&self) -> usize;
}

impl EstimateSize for [u8] {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for Vec<u8> {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl<T: EstimateSize + ?Sized> EstimateSize for &T {
    fn estimate_size(&self) -> usize {
        (**self).estimate_size()
    }
}

/// Decoded length of a standard base64 payload, computed from its length and
/// trailing padding. Unpadded tails are accounted for as well.
pub fn base64_decoded_len(payload: &str) -> usize {
    let bytes = payload.as_bytes();
    let padding = bytes.iter().rev().take(2).take_while(|&&b| b == b'=').count();
    let symbols = bytes.len() - padding;
    let full = symbols / 4 * 3;
    match symbols % 4 {
        2 => full + 1,
        3 => full + 2,
        // 1 leftover symbol carries no full byte
        _ => full,
    }
}

/// A self-describing `data:<mime>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    url: String,
    payload_start: usize,
}

impl DataUrl {
    /// Encode `bytes` as a data URL of the given media type.
    pub fn encode(media_type: &MediaType, bytes: &[u8]) -> Self {
        let header = format!("data:{}{}", media_type.mime(), BASE64_MARKER);
        let payload_start = header.len();
        let mut url = header;
        STANDARD.encode_string(bytes, &mut url);
        Self { url, payload_start }
    }

    /// Parse an existing data URL. Only base64 payloads are accepted.
    pub fn parse(url: impl Into<String>) -> CompressResult<Self> {
        let url = url.into();
        let rest = url.strip_prefix("data:").ok_or_else(|| {
            CompressError::validation("data_url", "must start with 'data:'", truncate(&url))
        })?;
        let marker = rest.find(BASE64_MARKER).ok_or_else(|| {
            CompressError::validation("data_url", "must be base64 encoded", truncate(&url))
        })?;
        let payload_start = "data:".len() + marker + BASE64_MARKER.len();
        Ok(Self { url, payload_start })
    }

    /// Media type from the header.
    pub fn media_type(&self) -> MediaType {
        let header = &self.url["data:".len()..self.payload_start - BASE64_MARKER.len()];
        MediaType::from_mime(header)
    }

    /// Base64 payload after the comma.
    pub fn payload(&self) -> &str {
        &self.url[self.payload_start..]
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }

    /// Decode the payload back to binary.
    pub fn decode(&self) -> CompressResult<Vec<u8>> {
        STANDARD
            .decode(self.payload())
            .map_err(|e| CompressError::decode(self.media_type().mime(), e.to_string()))
    }
}

impl EstimateSize for DataUrl {
    fn estimate_size(&self) -> usize {
        base64_decoded_len(self.payload())
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(48).collect()
}

/// Human-readable size, 1024-based.
pub fn format_file_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log(THRESHOLD) as usize).min(UNITS.len() - 1);
    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    format!("{:.2} {}", size, UNITS[unit_index])
}
