//! Domain-specific error types for metacopy
//!
//! # Error Categories
//!
//! - **ResolutionError**: a root, base or target label did not resolve to exactly one row.
//!   Raised before anything is written.
//! - **RemapError**: a reference could not be rewritten for a target context. Raised
//!   mid-transaction; the whole copy is rolled back.
//! - **CopyError**: the error returned by the copy service, wrapping the two above together
//!   with database and serialization failures.
//!
//! # Examples
//!
//! ```rust
//! use metacopy::errors::{CopyError, RemapError};
//!
//! let err: CopyError = RemapError::TableNotFound {
//!     table_id: 12,
//!     target: 3,
//! }
//! .into();
//! assert!(err.is_remap_error());
//! ```

pub mod copy;
pub mod remap;
pub mod resolution;

pub use copy::CopyError;
pub use remap::RemapError;
pub use resolution::ResolutionError;

/// Result type alias for remapping operations
pub type RemapResult<T> = Result<T, RemapError>;

/// Result type alias for copy operations
pub type CopyResult<T> = Result<T, CopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_result_alias() {
        let result: RemapResult<i32> = Err(RemapError::FieldNotFound {
            field_id: 1,
            target: 2,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_copy_result_alias() {
        let result: CopyResult<()> = Err(ResolutionError::RootNotFound("Everything".into()).into());
        assert!(matches!(result, Err(CopyError::Resolution(_))));
    }
}
