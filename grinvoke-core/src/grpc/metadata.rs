//! Conversions between `tonic` metadata and plain string collections.
use std::{collections::BTreeMap, str::FromStr};
use tonic::metadata::{
    AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue,
    KeyAndValueRef, MetadataMap,
    errors::{InvalidMetadataKey, InvalidMetadataValue},
};

/// Multi-valued metadata keyed by lower-case header name.
pub type MetadataEntries = BTreeMap<String, Vec<String>>;

/// Keys owned by the gRPC/HTTP2 transport rather than by the application.
pub const RESERVED_KEYS: &[&str] = &[
    "content-type",
    "date",
    "grpc-accept-encoding",
    "grpc-encoding",
    "grpc-message",
    "grpc-status",
    "grpc-status-details-bin",
];

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// Builds outgoing metadata from `key`/`value` pairs.
///
/// Keys ending in `-bin` carry the raw bytes of their value, which the transport base64-encodes
/// on the wire. Every other value must be printable ASCII. Repeated keys keep every value.
pub fn to_metadata_map(headers: &[(String, String)]) -> Result<MetadataMap, MetadataError> {
    let mut map = MetadataMap::new();
    for (k, v) in headers {
        let invalid_key = |source| MetadataError::InvalidKey {
            key: k.clone(),
            source,
        };

        if is_binary_key(k) {
            let key = BinaryMetadataKey::from_bytes(k.as_bytes()).map_err(invalid_key)?;
            map.append_bin(key, BinaryMetadataValue::from_bytes(v.as_bytes()));
        } else {
            let key = AsciiMetadataKey::from_str(k).map_err(invalid_key)?;
            let val = AsciiMetadataValue::from_str(v).map_err(|source| {
                MetadataError::InvalidValue {
                    key: k.clone(),
                    source,
                }
            })?;
            map.append(key, val);
        }
    }
    Ok(map)
}

fn is_binary_key(key: &str) -> bool {
    let key = key.as_bytes();
    key.len() > 4 && key[key.len() - 4..].eq_ignore_ascii_case(b"-bin")
}

/// Collects application metadata, skipping [`RESERVED_KEYS`].
///
/// Binary (`-bin`) values are kept in their base64 wire form.
pub fn to_entries(map: &MetadataMap) -> MetadataEntries {
    let mut entries = MetadataEntries::new();

    for entry in map.iter() {
        let (key, value) = match entry {
            KeyAndValueRef::Ascii(key, value) => (key.as_str(), value.as_encoded_bytes()),
            KeyAndValueRef::Binary(key, value) => (key.as_str(), value.as_encoded_bytes()),
        };

        if RESERVED_KEYS.contains(&key) {
            continue;
        }

        entries
            .entry(key.to_string())
            .or_default()
            .push(String::from_utf8_lossy(value).into_owned());
    }

    entries
}
