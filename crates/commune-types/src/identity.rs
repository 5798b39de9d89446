//! Composite record identity.
//!
//! A record's partial identifier is its ordered identity parts joined with
//! [`SEPARATOR`]. It is the backend-independent key of the record and is
//! unique within its collection. No part may be empty or contain the
//! separator, so parsing an identifier always recovers the parts it was
//! built from.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::collection::Collection;
use crate::error::IdentityError;

/// Reserved character joining identity parts.
pub const SEPARATOR: char = '/';

/// Backend-independent composite key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialId(String);

impl PartialId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PartialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PartialId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque identifier assigned by a backend on write (revision, change
/// vector, native document id). Distinct from the partial identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(pub String);

impl Reference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join identity parts into a partial identifier.
pub fn build<S: AsRef<str>>(parts: &[S]) -> Result<PartialId, IdentityError> {
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            return Err(IdentityError::InvalidIdentifier {
                part: part.to_string(),
                reason: "part is empty",
            });
        }
        if part.contains(SEPARATOR) {
            return Err(IdentityError::InvalidIdentifier {
                part: part.to_string(),
                reason: "part contains the separator",
            });
        }
    }

    let joined = parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string());
    Ok(PartialId(joined))
}

/// Split a partial identifier into the parts declared for `collection`.
pub fn parse(partial_id: &str, collection: Collection) -> Result<Vec<String>, IdentityError> {
    let parts: Vec<String> = partial_id.split(SEPARATOR).map(str::to_string).collect();
    let expected = collection.id_arity();
    if parts.len() != expected || parts.iter().any(String::is_empty) {
        return Err(IdentityError::MalformedIdentifier {
            partial_id: partial_id.to_string(),
            collection,
            expected,
            found: parts.len(),
        });
    }
    Ok(parts)
}

/// Validate an identifier received from outside (CLI, stored document) and
/// wrap it.
pub fn validate(partial_id: &str, collection: Collection) -> Result<PartialId, IdentityError> {
    parse(partial_id, collection)?;
    Ok(PartialId(partial_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_joins_parts() {
        let id = build(&["123", "456", "1700000000000"]).unwrap();
        assert_eq!(id.as_str(), "123/456/1700000000000");
    }

    #[test]
    fn test_roundtrip() {
        let cases: [(&[&str], Collection); 3] = [
            (&["g1", "a1", "1700000000000"], Collection::Resources),
            (&["g1", "a1"], Collection::EntryRequests),
            (&["u1"], Collection::Users),
        ];
        for (parts, collection) in cases {
            let id = build(parts).unwrap();
            assert_eq!(parse(id.as_str(), collection).unwrap(), parts);
        }
    }

    #[test]
    fn test_build_rejects_separator() {
        let err = build(&["g1", "a/1", "1700000000000"]).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidIdentifier { ref part, .. } if part == "a/1"));
    }

    #[test]
    fn test_build_rejects_empty_part() {
        let err = build(&["g1", ""]).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_parse_wrong_arity() {
        let err = parse("g1/a1", Collection::Resources).unwrap_err();
        assert_eq!(
            err,
            IdentityError::MalformedIdentifier {
                partial_id: "g1/a1".to_string(),
                collection: Collection::Resources,
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert!(parse("g1//1700000000000", Collection::Resources).is_err());
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("u1", Collection::Users).unwrap().as_str(), "u1");
        assert!(validate("u1/u2", Collection::Users).is_err());
    }
}
