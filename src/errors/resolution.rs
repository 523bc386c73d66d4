//! Label resolution errors
//!
//! Every command starts by turning human labels (the environments collection name, the base
//! environment name, target database names) into row ids. These errors are raised before the
//! copy writes anything.

use thiserror::Error;

/// Errors resolving roots and target contexts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No top-level collection carries the root label
    #[error("No root collection named \"{0}\"")]
    RootNotFound(String),

    /// Several top-level collections carry the root label
    #[error("Found several root collections named \"{0}\"")]
    AmbiguousRoot(String),

    /// No collection under the root matches the base label
    #[error("No base collection named \"{label}\" under root {root_id}")]
    BaseCollectionNotFound { label: String, root_id: i32 },

    /// Several collections under the root match the base label
    #[error("Found collection conflicts for \"{label}\": {ids:?}")]
    AmbiguousBaseCollection { label: String, ids: Vec<i32> },

    /// No database matches the base label
    #[error("No base database named \"{0}\"")]
    BaseDatabaseNotFound(String),

    /// Several databases match the base label
    #[error("Found database conflicts for \"{label}\": {ids:?}")]
    AmbiguousBaseDatabase { label: String, ids: Vec<i32> },

    /// No database matches the requested target label
    #[error("No target database matching \"{0}\"")]
    TargetNotFound(String),

    /// Several databases match the requested target label
    #[error("Found several target databases matching \"{label}\": {names:?}")]
    AmbiguousTarget { label: String, names: Vec<String> },

    /// The allow-list filtered every target away
    #[error("No target databases left after filtering with {0:?}")]
    NoTargets(Vec<String>),

    /// A source collection or card id does not exist
    #[error("{entity} {id} not found")]
    SourceNotFound { entity: &'static str, id: i32 },
}

impl ResolutionError {
    /// Check if the error comes from a label matching several rows
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            ResolutionError::AmbiguousRoot(_)
                | ResolutionError::AmbiguousBaseCollection { .. }
                | ResolutionError::AmbiguousBaseDatabase { .. }
                | ResolutionError::AmbiguousTarget { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_classification() {
        assert!(ResolutionError::AmbiguousRoot("x".into()).is_ambiguous());
        assert!(ResolutionError::AmbiguousTarget {
            label: "prod".into(),
            names: vec!["prod eu".into(), "prod us".into()],
        }
        .is_ambiguous());
        assert!(!ResolutionError::TargetNotFound("prod".into()).is_ambiguous());
    }

    #[test]
    fn test_error_display() {
        let err = ResolutionError::SourceNotFound {
            entity: "Card",
            id: 7,
        };
        assert_eq!(err.to_string(), "Card 7 not found");
    }
}
