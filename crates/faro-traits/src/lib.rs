#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and trait definitions for the Faro factor research pipeline.
//!
//! This crate provides the shared vocabulary of every stage: the error type,
//! dates and symbols, CSV-backed tables, date-by-entity matrices, the
//! classifier contract, and the progress log used to resume long runs.

/// The version of the faro-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod classifier;
pub mod error;
pub mod matrix;
pub mod progress;
pub mod stats;
pub mod types;

// Re-exports
pub use classifier::{Classifier, LabeledView, TrainedModel};
pub use error::{FaroError, Result};
pub use matrix::DatedMatrix;
pub use progress::{FileProgressStore, MemoryProgressStore, ProgressStore};
pub use types::{Date, Frame, FrameBuilder, Symbol, format_date, parse_date, shift_years};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
