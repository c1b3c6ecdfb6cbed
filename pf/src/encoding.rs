//! Diagram source encoding for rendering-service URLs
//!
//! The rendering server expects the source compressed with raw DEFLATE (no
//! zlib header) and packed with base64 bit layout over its own alphabet:
//! digits, uppercase, lowercase, `-`, `_`, and no padding.

use base64::Engine as _;
use base64::alphabet::Alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;
use tracing::debug;

const SYMBOLS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

const PLANTUML_ALPHABET: Alphabet = match Alphabet::new(SYMBOLS) {
    Ok(alphabet) => alphabet,
    Err(_) => panic!("invalid rendering alphabet"),
};

const PLANTUML: GeneralPurpose = GeneralPurpose::new(
    &PLANTUML_ALPHABET,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Compression level used for every token
const DEFLATE_LEVEL: u8 = 9;

/// Errors from decoding a token back into source
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Invalid token symbol: {0}")]
    InvalidSymbol(String),

    #[error("Corrupt deflate stream: {0}")]
    Inflate(String),
}

/// Encode diagram source into a URL-safe token
///
/// Total and deterministic. Empty input yields an empty token.
pub fn encode(source: impl AsRef<[u8]>) -> String {
    let source = source.as_ref();
    debug!(len = source.len(), "encode: called");
    if source.is_empty() {
        return String::new();
    }
    let compressed = miniz_oxide::deflate::compress_to_vec(source, DEFLATE_LEVEL);
    pack(&compressed)
}

/// Reverse [`encode`], returning the original source bytes
pub fn decode(token: &str) -> Result<Vec<u8>, EncodeError> {
    debug!(len = token.len(), "decode: called");
    if token.is_empty() {
        return Ok(Vec::new());
    }
    let compressed = unpack(token)?;
    miniz_oxide::inflate::decompress_to_vec(&compressed).map_err(|e| EncodeError::Inflate(format!("{:?}", e.status)))
}

fn pack(bytes: &[u8]) -> String {
    PLANTUML.encode(bytes)
}

fn unpack(token: &str) -> Result<Vec<u8>, EncodeError> {
    PLANTUML
        .decode(token)
        .map_err(|e| EncodeError::InvalidSymbol(e.to_string()))
}
