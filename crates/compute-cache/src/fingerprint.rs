//! Canonical fingerprints for cache requests.
//!
//! A request is first lowered into a [`RequestValue`] tree and then written
//! out in a canonical text form:
//!
//! - mapping keys are emitted in sorted order, so insertion order never
//!   changes the key
//! - sequence order is preserved
//! - nested cacheable entities contribute only their own fingerprint
//! - NaN, infinities, null and absent values use fixed bare sentinels that no
//!   quoted string can collide with
//!
//! `RequestValue` is an owned tree, so a cyclic request cannot be built in the
//! first place.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FingerprintError;

/// Canonical cache key derived from a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Borrow the canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the canonical text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Structural value a request is lowered into before fingerprinting.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestValue {
    /// An absent optional field.
    Undefined,
    /// An explicit null.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence or tuple.
    Seq(Vec<RequestValue>),
    /// Mapping with unique keys; key order is not significant.
    Map(BTreeMap<String, RequestValue>),
    /// A nested cacheable entity, represented by its fingerprint.
    Entity(Fingerprint),
}

impl RequestValue {
    /// Build a mapping from key/value pairs, rejecting repeated keys.
    pub fn try_map<I, K, V>(pairs: I) -> Result<Self, FingerprintError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RequestValue>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            if map.contains_key(&key) {
                return Err(FingerprintError::DuplicateKey(key));
            }
            map.insert(key, value.into());
        }
        Ok(Self::Map(map))
    }

    /// Build an ordered sequence.
    pub fn seq<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RequestValue>,
    {
        Self::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Embed a cacheable entity by its fingerprint.
    pub fn entity<T: Fingerprintable + ?Sized>(value: &T) -> Result<Self, FingerprintError> {
        Ok(Self::Entity(value.fingerprint()?))
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Undefined => out.push_str("undefined"),
            Self::Null => out.push_str("null"),
            Self::Bool(true) => out.push_str("true"),
            Self::Bool(false) => out.push_str("false"),
            Self::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Self::Float(v) => write_float(*v, out),
            Self::Str(s) => write_quoted(s, out),
            Self::Seq(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Map(map) => {
                out.push('{');
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    write_quoted(key, out);
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
            Self::Entity(fp) => {
                out.push('@');
                write_quoted(fp.as_str(), out);
            }
        }
    }
}

fn write_float(v: f64, out: &mut String) {
    if v.is_nan() {
        out.push_str("NaN");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "inf" } else { "-inf" });
    } else if v == 0.0 {
        // -0.0 == 0.0 structurally
        out.push_str("0.0");
    } else {
        // Debug keeps a fractional part, so 1.0 never collides with Int(1).
        let _ = write!(out, "{v:?}");
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push_str(&serde_json::Value::String(s.to_owned()).to_string());
}

/// Compute the canonical fingerprint of a request value.
pub fn fingerprint(value: &RequestValue) -> Fingerprint {
    let mut out = String::new();
    value.write_canonical(&mut out);
    Fingerprint(out)
}

/// A request type that can be keyed in a compute cache.
pub trait Fingerprintable {
    /// Lower the request into its structural form.
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError>;

    /// Canonical cache key for this request.
    fn fingerprint(&self) -> Result<Fingerprint, FingerprintError> {
        Ok(fingerprint(&self.to_request_value()?))
    }
}

impl Fingerprintable for RequestValue {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        Ok(self.clone())
    }
}

impl<T: Fingerprintable + ?Sized> Fingerprintable for Arc<T> {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        (**self).to_request_value()
    }

    fn fingerprint(&self) -> Result<Fingerprint, FingerprintError> {
        (**self).fingerprint()
    }
}

impl<T: Fingerprintable + ?Sized> Fingerprintable for &T {
    fn to_request_value(&self) -> Result<RequestValue, FingerprintError> {
        (**self).to_request_value()
    }

    fn fingerprint(&self) -> Result<Fingerprint, FingerprintError> {
        (**self).fingerprint()
    }
}

impl From<bool> for RequestValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for RequestValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for RequestValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for RequestValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<usize> for RequestValue {
    fn from(v: usize) -> Self {
        match i64::try_from(v) {
            Ok(v) => Self::Int(v),
            Err(_) => Self::Float(v as f64),
        }
    }
}

impl From<f32> for RequestValue {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<f64> for RequestValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for RequestValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for RequestValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Fingerprint> for RequestValue {
    fn from(v: Fingerprint) -> Self {
        Self::Entity(v)
    }
}

impl<T: Into<RequestValue>> From<Option<T>> for RequestValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Undefined, Into::into)
    }
}

impl<T: Into<RequestValue>> From<Vec<T>> for RequestValue {
    fn from(v: Vec<T>) -> Self {
        Self::seq(v)
    }
}

impl<T: Into<RequestValue>, const N: usize> From<[T; N]> for RequestValue {
    fn from(v: [T; N]) -> Self {
        Self::seq(v)
    }
}
