//! Content-derived bucket identifiers.
//!
//! Items and auxiliary content are converted to JSON values, their object
//! keys sorted at every depth, and the two encodings are concatenated (items
//! first) before being signed with HMAC-SHA256 under the application's
//! bucket key. Sequence order is significant; mapping order is not.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::ser::Error as _;
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

use super::finite::{FiniteError, ensure_finite};

type HmacSha256 = Hmac<Sha256>;

/// Length of a derived bucket ID in characters (hex-encoded SHA-256).
pub const BUCKET_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("bucket hash key must not be empty")]
    EmptyKey,
    #[error("bucket hash key was rejected by the MAC")]
    InvalidKey,
    #[error("bucket content cannot be canonically encoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("bucket content contains a NaN or infinite number")]
    NonFiniteNumber,
}

impl From<FiniteError> for IdentityError {
    fn from(err: FiniteError) -> Self {
        match err {
            FiniteError::NonFinite => Self::NonFiniteNumber,
            FiniteError::Custom(message) => Self::Encoding(serde_json::Error::custom(message)),
        }
    }
}

/// Derives stable bucket IDs from content.
///
/// The key must stay the same for the lifetime of the stored buckets;
/// rotating it orphans every content-addressed bucket.
#[derive(Clone)]
pub struct ContentIdentity {
    mac: HmacSha256,
}

impl std::fmt::Debug for ContentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentIdentity")
            .field("mac", &"HMAC-SHA256")
            .finish()
    }
}

impl ContentIdentity {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, IdentityError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(IdentityError::EmptyKey);
        }
        let mac = <HmacSha256 as KeyInit>::new_from_slice(key)
            .map_err(|_| IdentityError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// ID for a collection of items and its auxiliary content.
    pub fn derive_id<T, A>(&self, items: &T, additional: &A) -> Result<String, IdentityError>
    where
        T: Serialize + ?Sized,
        A: Serialize + ?Sized,
    {
        let mut bytes = canonical_bytes(items)?;
        bytes.extend(canonical_bytes(additional)?);
        Ok(self.sign(&bytes))
    }

    /// ID for a single piece of content, used by data-source buckets.
    pub fn derive_content_id<C>(&self, content: &C) -> Result<String, IdentityError>
    where
        C: Serialize + ?Sized,
    {
        let bytes = canonical_bytes(content)?;
        Ok(self.sign(&bytes))
    }

    fn sign(&self, bytes: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(bytes);
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Canonical byte encoding of any serializable value.
pub fn canonical_bytes<T>(value: &T) -> Result<Vec<u8>, IdentityError>
where
    T: Serialize + ?Sized,
{
    let value = canonicalize(encode_value(value)?);
    Ok(serde_json::to_vec(&value)?)
}

/// Convert to a JSON value without losing information.
///
/// NaN and infinities are rejected instead of being written as `null`.
pub fn encode_value<T>(value: &T) -> Result<Value, IdentityError>
where
    T: Serialize + ?Sized,
{
    ensure_finite(value)?;
    Ok(serde_json::to_value(value)?)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn identity() -> ContentIdentity {
        ContentIdentity::new("unit-test-key").expect("non-empty key")
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            ContentIdentity::new(b""),
            Err(IdentityError::EmptyKey)
        ));
    }

    #[test]
    fn same_content_same_id() {
        let id = identity();
        let items = vec!["a", "b"];
        let additional = json!({"filter": "x"});

        let first = id.derive_id(&items, &additional).unwrap();
        let second = id.derive_id(&items, &additional).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), BUCKET_ID_LEN);
    }

    #[test]
    fn item_order_matters() {
        let id = identity();
        let empty = json!({});
        assert_ne!(
            id.derive_id(&["a", "b"], &empty).unwrap(),
            id.derive_id(&["b", "a"], &empty).unwrap()
        );
    }

    #[test]
    fn mapping_key_order_does_not_matter() {
        let id = identity();
        let mut left = Map::new();
        left.insert("b".into(), json!(1));
        left.insert("a".into(), json!({"y": 2, "x": 1}));
        let mut right = Map::new();
        right.insert("a".into(), json!({"x": 1, "y": 2}));
        right.insert("b".into(), json!(1));

        assert_eq!(
            id.derive_content_id(&left).unwrap(),
            id.derive_content_id(&right).unwrap()
        );
    }

    #[test]
    fn additional_content_changes_the_id() {
        let id = identity();
        let items = [1, 2, 3];
        assert_ne!(
            id.derive_id(&items, &json!({"page": 1})).unwrap(),
            id.derive_id(&items, &json!({"page": 2})).unwrap()
        );
    }

    #[test]
    fn key_changes_the_id() {
        let other = ContentIdentity::new("another-key").unwrap();
        let items = [1];
        let empty = json!({});
        assert_ne!(
            identity().derive_id(&items, &empty).unwrap(),
            other.derive_id(&items, &empty).unwrap()
        );
    }

    #[test]
    fn non_string_map_keys_fail_to_encode() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "value");
        let err = identity()
            .derive_content_id(&map)
            .expect_err("vector keys cannot be encoded");
        assert!(matches!(err, IdentityError::Encoding(_)));
    }

    #[test]
    fn non_finite_numbers_do_not_collide_with_null() {
        let empty = json!({});
        let err = identity()
            .derive_id(&[Some(f64::NAN)], &empty)
            .expect_err("NaN cannot be encoded");
        assert!(matches!(err, IdentityError::NonFiniteNumber));
        assert!(identity().derive_id(&[None::<f64>], &empty).is_ok());
    }

    #[test]
    fn encode_value_keeps_finite_floats() {
        assert_eq!(
            encode_value(&[0.5, -1.25]).unwrap(),
            json!([0.5, -1.25])
        );
        assert!(matches!(
            encode_value(&[1.0, f64::INFINITY]),
            Err(IdentityError::NonFiniteNumber)
        ));
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let rendered = format!("{:?}", identity());
        assert!(!rendered.contains("unit-test-key"));
    }
}
