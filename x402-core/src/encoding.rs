//! Base64-over-JSON codec for x402 header values.
//!
//! Values are serialized to JSON and then base64-encoded with the URL-safe
//! alphabet and no padding. Decoding accepts either alphabet, with or without
//! trailing padding, since peers differ in what they emit. A value
//! mixing both alphabets, or carrying `=` anywhere but at the end, is
//! malformed.

use std::fmt::{self, Display, Formatter};

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD as b64};
use base64::engine::DecodePaddingMode;
use base64::{Engine, alphabet};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Failure to turn a header value back into a typed message.
///
/// Decoding failures are protocol faults and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum DecodingError {
    /// The value is not valid base64 in either alphabet.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not the expected JSON document.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

const OPTIONAL_PADDING: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_DECODER: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, OPTIONAL_PADDING);

const STANDARD_DECODER: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, OPTIONAL_PADDING);

/// Base64 text held as bytes, as it appears in an HTTP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 text to raw bytes.
    ///
    /// Standard (`+`, `/`) and URL-safe (`-`, `_`) alphabets are both
    /// accepted, but not within one value. `=` is only allowed as trailing
    /// padding, which is optional. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let text = self.0.trim_ascii();
        if text.iter().any(|b| matches!(b, b'+' | b'/')) {
            STANDARD_DECODER.decode(text)
        } else {
            URL_SAFE_DECODER.decode(text)
        }
    }

    /// Encodes raw bytes as unpadded URL-safe base64.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl From<&str> for Base64Bytes {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Serializes `value` to JSON and encodes it for use as a header value.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented as JSON.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Decodes a header value produced by [`encode`] (or by a peer using the
/// standard alphabet) into a typed message.
///
/// JSON key order is irrelevant.
///
/// # Errors
///
/// Returns [`DecodingError`] if the text is not base64 or the decoded bytes
/// are not the expected JSON document.
pub fn decode<T: DeserializeOwned>(encoded: impl AsRef<[u8]>) -> Result<T, DecodingError> {
    let bytes = Base64Bytes::from(encoded.as_ref()).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}
