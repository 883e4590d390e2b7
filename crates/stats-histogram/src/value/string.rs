use std::cmp::Ordering;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use super::{normalized, Collation, HistogramValue, ValueDataType};
use crate::arena::Arena;
use crate::{HistogramError, Result};

/// Byte string viewed from storage owned elsewhere, tagged with its collation.
///
/// Copying a `CollatedStr` copies the view, not the bytes. Use
/// [`HistogramValue::clone_in`] to give a value its own backing storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollatedStr<'a> {
    bytes: &'a [u8],
    collation: Collation,
}

impl<'a> CollatedStr<'a> {
    pub fn new(bytes: &'a [u8], collation: Collation) -> Self {
        Self { bytes, collation }
    }

    pub fn from_text(value: &'a str, collation: Collation) -> Self {
        Self::new(value.as_bytes(), collation)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CollatedStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.bytes))?;
        if self.collation != Collation::Binary {
            write!(f, " ({:?})", self.collation)?;
        }
        Ok(())
    }
}

/// Marks an endpoint stored as base64 because its bytes are not plain text.
const BASE64_PREFIX: &str = "base64:type254:";

/// Reads up to eight bytes as a big-endian integer, zero padded on the right.
fn leading_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    u64::from_be_bytes(buf)
}

impl<'a> HistogramValue<'a> for CollatedStr<'a> {
    type InArena<'b> = CollatedStr<'b>;

    const DATA_TYPE: ValueDataType = ValueDataType::String;

    fn histogram_cmp(&self, other: &Self) -> Ordering {
        let lhs = self.collation.sort_key(self.bytes);
        let rhs = self.collation.sort_key(other.bytes);
        lhs.as_ref().cmp(rhs.as_ref())
    }

    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64 {
        let collation = self.collation;
        let value = collation.sort_key(self.bytes);
        let lower = collation.sort_key(lower.bytes);
        let upper = collation.sort_key(upper.bytes);

        // Any value inside [lower, upper] shares their common prefix, so only
        // the bytes after it carry positional information.
        let prefix = lower
            .iter()
            .zip(upper.iter())
            .take_while(|(l, u)| l == u)
            .count();
        let tail = |bytes: &[u8]| leading_u64(bytes.get(prefix..).unwrap_or(&[]));
        let lower_num = tail(&lower[..]);
        let upper_num = tail(&upper[..]);
        let value_num = tail(&value[..]);
        normalized(
            value_num.saturating_sub(lower_num) as f64,
            upper_num.saturating_sub(lower_num) as f64,
        )
    }

    fn to_json(&self) -> Result<Value> {
        let text = match std::str::from_utf8(self.bytes) {
            Ok(text) if !text.starts_with(BASE64_PREFIX) => text.to_owned(),
            _ => format!("{BASE64_PREFIX}{}", STANDARD.encode(self.bytes)),
        };
        Ok(Value::String(text))
    }

    fn from_json(json: &Value, arena: &'a Arena, collation: Collation) -> Result<Self> {
        let s = json.as_str().ok_or_else(|| {
            HistogramError::Deserialization(format!("expected string, got {json}"))
        })?;
        let bytes = match s.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => {
                let decoded = STANDARD.decode(encoded).map_err(|err| {
                    HistogramError::Deserialization(format!("invalid base64 string value: {err}"))
                })?;
                arena.alloc_bytes(&decoded)?
            }
            None => arena.alloc_bytes(s.as_bytes())?,
        };
        Ok(CollatedStr::new(bytes, collation))
    }

    fn clone_in<'b>(&self, arena: &'b Arena) -> Result<CollatedStr<'b>> {
        let bytes = arena.alloc_bytes(self.bytes)?;
        Ok(CollatedStr::new(bytes, self.collation))
    }
}
