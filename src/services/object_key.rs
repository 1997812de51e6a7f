//! Storage keys for processed videos and the persisted `bucket,key`
//! reference format.

use crate::services::media_probe::Orientation;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Random bytes behind each key's identifier segment.
const KEY_ENTROPY_BYTES: usize = 32;
const REFERENCE_DELIMITER: char = ',';

/// Build `<orientation>/<random>.mp4`. The identifier is URL-safe base64
/// without padding over bytes from the OS CSPRNG; no uniqueness check
/// against the store is made.
pub fn derive_key(orientation: Orientation) -> String {
    let mut bytes = [0u8; KEY_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}/{}.mp4", orientation, URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidReferenceError {
    #[error("invalid video reference `{0}`: expected `bucket,key`")]
    Format(String),
    #[error("{part} `{value}` must not contain `,`")]
    ReservedDelimiter { part: &'static str, value: String },
}

/// Location of a stored object. Persisted as the single string `bucket,key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    bucket: String,
    key: String,
}

impl AssetReference {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self, InvalidReferenceError> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.contains(REFERENCE_DELIMITER) {
            return Err(InvalidReferenceError::ReservedDelimiter {
                part: "bucket",
                value: bucket,
            });
        }
        if key.contains(REFERENCE_DELIMITER) {
            return Err(InvalidReferenceError::ReservedDelimiter {
                part: "key",
                value: key,
            });
        }
        Ok(Self { bucket, key })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.bucket, REFERENCE_DELIMITER, self.key)
    }
}

impl FromStr for AssetReference {
    type Err = InvalidReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(REFERENCE_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(bucket), Some(key), None) => Ok(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(InvalidReferenceError::Format(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_orientation_prefix_and_mp4_suffix() {
        for orientation in Orientation::ALL {
            let key = derive_key(orientation);
            let prefix = format!("{}/", orientation);
            assert!(key.starts_with(&prefix), "{key}");
            assert!(key.ends_with(".mp4"), "{key}");

            let id = &key[prefix.len()..key.len() - ".mp4".len()];
            // 32 bytes -> 43 unpadded base64 chars
            assert_eq!(id.len(), 43);
            assert!(
                id.bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            );
            assert!(!key.contains(','));
        }
    }

    #[test]
    fn keys_do_not_repeat() {
        let a = derive_key(Orientation::Landscape);
        let b = derive_key(Orientation::Landscape);
        assert_ne!(a, b);
    }

    #[test]
    fn reference_round_trips() {
        let cases = [
            ("videos", "landscape/abc.mp4"),
            ("my-bucket", "portrait/x_y-z.mp4"),
            ("", ""),
        ];
        for (bucket, key) in cases {
            let reference = AssetReference::new(bucket, key).unwrap();
            let decoded: AssetReference = reference.to_string().parse().unwrap();
            assert_eq!(decoded.bucket(), bucket);
            assert_eq!(decoded.key(), key);
        }
    }

    #[test]
    fn decode_requires_exactly_one_delimiter() {
        for bad in ["", "no-delimiter", "a,b,c", ",,", "https://bucket.s3.amazonaws.com/key"] {
            assert_eq!(
                bad.parse::<AssetReference>(),
                Err(InvalidReferenceError::Format(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn encode_rejects_delimiter_in_parts() {
        assert!(matches!(
            AssetReference::new("a,b", "k"),
            Err(InvalidReferenceError::ReservedDelimiter { part: "bucket", .. })
        ));
        assert!(matches!(
            AssetReference::new("b", "k,1"),
            Err(InvalidReferenceError::ReservedDelimiter { part: "key", .. })
        ));
    }
}
