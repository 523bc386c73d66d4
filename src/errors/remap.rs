//! Remapping errors
//!
//! A remap error means the copy cannot produce a self-consistent duplicate for one target
//! context: the target schema diverges from the source, or a foreign key points outside the
//! set of rows copied so far. Each variant names the offending id and the target database id.

use thiserror::Error;

use crate::copy::EntityKind;

/// Errors rewriting references for a target context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemapError {
    /// A location segment after the first remapped one has no translation
    #[error("Cannot remap location {location} for target {target}: segment {segment} has no copy")]
    PartialLocation {
        location: String,
        segment: String,
        target: i32,
    },

    /// A location segment is not a collection id
    #[error("Malformed location {location}: segment {segment:?} is not an id")]
    MalformedLocation { location: String, segment: String },

    /// A foreign key has no entry in the id-translation map
    #[error("{kind} {source_id} has no copy for target {target}")]
    Unmapped {
        kind: EntityKind,
        source_id: i32,
        target: i32,
    },

    /// A source table or field id does not exist
    #[error("Source {kind} {id} not found")]
    SourceMissing { kind: &'static str, id: i32 },

    /// No table with the same schema and name exists in the target database
    #[error("Table {table_id} has no namesake in target {target}")]
    TableNotFound { table_id: i32, target: i32 },

    /// No field with the same name exists on the target table
    #[error("Field {field_id} has no namesake in target {target}")]
    FieldNotFound { field_id: i32, target: i32 },

    /// A reference inside a query has an unexpected shape
    #[error("Invalid {key} reference: {value}")]
    InvalidReference { key: &'static str, value: String },

    /// A nested card is referenced but was not copied and auto-copy is disabled
    #[error("Nested card {card_id} was not copied to target {target}")]
    NestedCardNotCopied { card_id: i32, target: i32 },

    /// Cards reference each other through `card__<id>` source tables
    #[error("Card {card_id} references itself through nested cards in target {target}")]
    NestedCardCycle { card_id: i32, target: i32 },

    /// A permission object does not follow `/collection/<id>/...`
    #[error("Invalid permission object {0}")]
    InvalidPermissionObject(String),
}

impl RemapError {
    /// The target database the failure was raised for, when known
    pub fn target(&self) -> Option<i32> {
        match self {
            RemapError::PartialLocation { target, .. }
            | RemapError::Unmapped { target, .. }
            | RemapError::TableNotFound { target, .. }
            | RemapError::FieldNotFound { target, .. }
            | RemapError::NestedCardNotCopied { target, .. }
            | RemapError::NestedCardCycle { target, .. } => Some(*target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_extraction() {
        let err = RemapError::Unmapped {
            kind: EntityKind::Card,
            source_id: 4,
            target: 9,
        };
        assert_eq!(err.target(), Some(9));
        assert_eq!(err.to_string(), "card 4 has no copy for target 9");

        let err = RemapError::NestedCardCycle {
            card_id: 7,
            target: 3,
        };
        assert_eq!(err.target(), Some(3));
        assert_eq!(
            err.to_string(),
            "Card 7 references itself through nested cards in target 3"
        );

        let err = RemapError::InvalidPermissionObject("/db/1/".into());
        assert_eq!(err.target(), None);
    }
}
