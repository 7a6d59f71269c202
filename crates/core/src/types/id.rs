//! Newtype IDs for type-safe entity references.
//!
//! Velour documents live in a document store whose object ids are 24-character
//! lowercase hex strings. The `define_id!` macro creates type-safe wrappers
//! around that representation so IDs from different entity types can never be
//! mixed up.
//!
//! This module also hosts [`order_id_candidates`], the ordered list of
//! candidate-extraction strategies used to recover an order id from the noisy
//! encodings admin clients have been observed to send (raw hex, URL-encoded,
//! JSON-wrapped extended-JSON, quoted/braced strings).

use serde::{Deserialize, Serialize};

/// Length of a document-store object id in hex characters.
pub const OBJECT_ID_HEX_LEN: usize = 24;

/// Errors that can occur when parsing a typed id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input is not 24 characters long.
    #[error("id must be exactly {OBJECT_ID_HEX_LEN} characters, got {0}")]
    BadLength(usize),
    /// The input contains a non-hex character.
    #[error("id must be hex")]
    NotHex,
}

fn validate_hex(s: &str) -> Result<(), IdError> {
    if s.len() != OBJECT_ID_HEX_LEN {
        return Err(IdError::BadLength(s.len()));
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IdError::NotHex);
    }
    Ok(())
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around a 24-character hex `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - `parse()` with hex validation, `as_str()`, `into_inner()`
/// - `Display` and `FromStr` implementations
///
/// # Example
///
/// ```rust
/// # use velour_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::parse("64b1f0a2c3d4e5f60718293a").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: OrderId = user_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse an id, validating length and hex alphabet.
            /// Uppercase hex is accepted and normalized to lowercase.
            ///
            /// # Errors
            ///
            /// Returns [`$crate::types::id::IdError`] if the input is not a
            /// 24-character hex string.
            pub fn parse(s: &str) -> Result<Self, $crate::types::id::IdError> {
                $crate::types::id::validate_hex_str(s)?;
                Ok(Self(s.to_ascii_lowercase()))
            }

            /// Get the underlying hex string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Validation helper used by the `define_id!` macro. Not part of the public
/// API surface beyond macro expansion.
#[doc(hidden)]
pub fn validate_hex_str(s: &str) -> Result<(), IdError> {
    validate_hex(s)
}

// Standard entity IDs
define_id!(ProductId);
define_id!(OrderId);
define_id!(UserId);

/// Extract order-id candidates from a raw path segment, in resolution order.
///
/// Admin clients have been observed sending the order id in several shapes:
/// the bare hex id, the id URL-encoded, an extended-JSON document such as
/// `{"$oid":"..."}`, and quoted or braced strings from which only the hex
/// characters are meaningful. Each strategy below contributes a candidate
/// string; invalid candidates are discarded and the remainder deduplicated
/// preserving order, so callers can try them in sequence and stop at the
/// first lookup hit.
///
/// Strategies, in order:
/// 1. the raw input, trimmed
/// 2. the URL-decoded input, when decoding changes it
/// 3. `$oid` / `$id` values from a JSON object payload
/// 4. every prior candidate stripped to hex characters, when exactly 24
///    survive
#[must_use]
pub fn order_id_candidates(raw: &str) -> Vec<OrderId> {
    let raw = raw.trim();
    let mut candidates: Vec<String> = vec![raw.to_owned()];

    if let Ok(decoded) = urlencoding::decode(raw)
        && decoded != raw
    {
        candidates.push(decoded.into_owned());
    }

    // Decoding may reveal a JSON wrapper, so unwrap every candidate seen so far.
    let json_sources: Vec<String> = candidates
        .iter()
        .filter(|c| c.trim_start().starts_with('{'))
        .cloned()
        .collect();
    for source in json_sources {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&source) {
            for key in ["$oid", "$id"] {
                if let Some(serde_json::Value::String(s)) = map.get(key) {
                    candidates.push(s.clone());
                }
            }
        }
    }

    // Strip every candidate seen so far down to its hex characters; quoting
    // noise like "..." survives URL decoding.
    let stripped: Vec<String> = candidates
        .iter()
        .map(|c| c.chars().filter(char::is_ascii_hexdigit).collect())
        .filter(|hex: &String| hex.len() == OBJECT_ID_HEX_LEN)
        .collect();
    candidates.extend(stripped);

    let mut out: Vec<OrderId> = Vec::new();
    for candidate in candidates {
        if let Ok(id) = OrderId::parse(&candidate)
            && !out.contains(&id)
        {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEX: &str = "64b1f0a2c3d4e5f60718293a";

    #[test]
    fn test_parse_valid() {
        let id = OrderId::parse(HEX).unwrap();
        assert_eq!(id.as_str(), HEX);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id = OrderId::parse("64B1F0A2C3D4E5F60718293A").unwrap();
        assert_eq!(id.as_str(), HEX);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!(matches!(
            OrderId::parse("abc123"),
            Err(IdError::BadLength(6))
        ));
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(matches!(
            OrderId::parse("zzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(IdError::NotHex)
        ));
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // ProductId and OrderId share a representation but not a type
        let p = ProductId::parse(HEX).unwrap();
        let o = OrderId::parse(HEX).unwrap();
        assert_eq!(p.as_str(), o.as_str());
    }

    #[test]
    fn test_serde_transparent() {
        let id = OrderId::parse(HEX).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{HEX}\""));
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_candidates_raw() {
        let c = order_id_candidates(HEX);
        assert_eq!(c, vec![OrderId::parse(HEX).unwrap()]);
    }

    #[test]
    fn test_candidates_url_encoded() {
        let encoded = format!("%22{HEX}%22");
        let c = order_id_candidates(&encoded);
        assert_eq!(c, vec![OrderId::parse(HEX).unwrap()]);
    }

    #[test]
    fn test_candidates_json_oid() {
        let wrapped = format!("{{\"$oid\":\"{HEX}\"}}");
        let c = order_id_candidates(&wrapped);
        assert_eq!(c, vec![OrderId::parse(HEX).unwrap()]);
    }

    #[test]
    fn test_candidates_url_encoded_json() {
        // {"$oid":"..."} percent-encoded, as seen from naive clients
        let wrapped = format!("%7B%22%24oid%22%3A%22{HEX}%22%7D");
        let c = order_id_candidates(&wrapped);
        assert_eq!(c, vec![OrderId::parse(HEX).unwrap()]);
    }

    #[test]
    fn test_candidates_hex_strip() {
        let noisy = format!("\"{HEX}\"");
        let c = order_id_candidates(&noisy);
        assert_eq!(c, vec![OrderId::parse(HEX).unwrap()]);
    }

    #[test]
    fn test_candidates_dedup_preserves_order() {
        // Raw and hex-stripped resolve to the same id; it must appear once.
        let c = order_id_candidates(HEX);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_candidates_garbage_is_empty() {
        assert!(order_id_candidates("not-an-id").is_empty());
        assert!(order_id_candidates("").is_empty());
    }
}
