//! Body normalization for display
//!
//! Captured bodies are stored as bounded, displayable text: UTF-8 when the
//! bytes allow it, base64 otherwise. Response bodies are gunzipped first when
//! they look compressed. Only the logged copy is transformed; the bytes
//! relayed to the caller never pass through here.

use crate::proxy::headers::CONTENT_ENCODING;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::MultiGzDecoder;
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Read;

/// Largest body prefix kept in the log
pub const MAX_BODY_LOG_SIZE: usize = 64 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// How a logged body's text is encoded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

impl BodyEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Base64 => "base64",
        }
    }
}

/// A body reduced to its displayable form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedBody {
    pub text: String,
    pub encoding: BodyEncoding,
    pub truncated: bool,
}

/// Normalize with the standard 64 KiB cap
pub fn normalize(body: &[u8]) -> NormalizedBody {
    normalize_with_cap(body, MAX_BODY_LOG_SIZE)
}

/// Truncate to `cap` bytes, then return UTF-8 text if possible (trimming up
/// to three bytes of a split character after truncation), else base64.
pub fn normalize_with_cap(body: &[u8], cap: usize) -> NormalizedBody {
    let truncated = body.len() > cap;
    let body = if truncated { &body[..cap] } else { body };

    if let Ok(text) = std::str::from_utf8(body) {
        return NormalizedBody {
            text: text.to_string(),
            encoding: BodyEncoding::Utf8,
            truncated,
        };
    }

    if truncated {
        let repaired = (1..=3)
            .take_while(|trim| body.len() > *trim)
            .find_map(|trim| std::str::from_utf8(&body[..body.len() - trim]).ok());
        if let Some(text) = repaired {
            return NormalizedBody {
                text: text.to_string(),
                encoding: BodyEncoding::Utf8,
                truncated,
            };
        }
    }

    NormalizedBody {
        text: STANDARD.encode(body),
        encoding: BodyEncoding::Base64,
        truncated,
    }
}

/// Bytes to display for a response body: gunzipped when the headers or the
/// magic number say gzip and decoding succeeds, otherwise the input.
pub fn decode_for_display<'a>(headers: &HeaderMap, body: &'a [u8]) -> Cow<'a, [u8]> {
    if body.is_empty() || !(is_gzip_encoded(headers) || is_gzip_data(body)) {
        return Cow::Borrowed(body);
    }

    match gunzip(body, MAX_BODY_LOG_SIZE + 1) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(error) => {
            tracing::debug!(%error, "gzip decode failed, logging raw body");
            Cow::Borrowed(body)
        }
    }
}

/// Case-insensitive `gzip` anywhere in `Content-Encoding`
pub fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .any(|value| String::from_utf8_lossy(value.as_bytes()).to_ascii_lowercase().contains("gzip"))
}

pub fn is_gzip_data(body: &[u8]) -> bool {
    body.starts_with(&GZIP_MAGIC)
}

/// Decompress at most `limit` bytes. Anything past the limit would be
/// truncated away by [`normalize`] anyway.
fn gunzip(body: &[u8], limit: usize) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    MultiGzDecoder::new(body)
        .take(limit as u64)
        .read_to_end(&mut decoded)?;
    Ok(decoded)
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    pub fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).expect("write to Vec cannot fail");
        encoder.finish().expect("finish to Vec cannot fail")
    }
}
