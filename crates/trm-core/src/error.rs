//! Unified error type for TRM computations
//!
//! Every fatal condition of the workspace is reported through [`TrmError`]:
//! configuration and consistency failures, unresolved identifier mappings,
//! network construction problems and failures reported by external engines.
//! Soft mismatches (an element missing on one side of an alignment) are not
//! errors; they are recorded in the aligner reports instead.
//!
//! # Example
//!
//! ```ignore
//! use trm_core::{TrmError, TrmResult};
//!
//! fn check(ids: &[String]) -> TrmResult<()> {
//!     if ids.is_empty() {
//!         return Err(TrmError::Configuration("no critical elements".into()));
//!     }
//!     Ok(())
//! }
//! ```

use crate::NetworkSide;
use thiserror::Error;

/// Unified error type for all TRM operations.
#[derive(Error, Debug)]
pub enum TrmError {
    /// I/O errors (file access, export targets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid or incomplete inputs (empty element sets, missing scalables, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inputs that contradict each other (several flows for one branch, ...)
    #[error("Inconsistent input: {0}")]
    Inconsistency(String),

    /// Identifier lookup in an [`IdentifiableMapping`](crate) that was never resolved
    #[error("No mapping found for '{id}' in the {side} network")]
    MappingNotFound { id: String, side: NetworkSide },

    /// Network structure errors (unknown element, duplicate id, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Failures reported by a load-flow, sensitivity or balance engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using TrmError.
pub type TrmResult<T> = Result<T, TrmError>;

impl From<anyhow::Error> for TrmError {
    fn from(err: anyhow::Error) -> Self {
        TrmError::Other(err.to_string())
    }
}

impl From<String> for TrmError {
    fn from(s: String) -> Self {
        TrmError::Other(s)
    }
}

impl From<&str> for TrmError {
    fn from(s: &str) -> Self {
        TrmError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for TrmError {
    fn from(err: serde_json::Error) -> Self {
        TrmError::Parse(err.to_string())
    }
}
