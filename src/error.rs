//! # Error Handling
//!
//! This module defines the centralized error type for `bundle-reconcile`. It
//! uses `thiserror` to build a single `Error` enum covering every failure the
//! engine can report, with messages that name the offending value.
//!
//! ## Key Components
//!
//! - **`Error`**: every failure mode of the library. Configuration problems
//!   (`ConfigParse`, `InvalidRegistryMapping`) and malformed image references
//!   are raised immediately; provenance and catalog failures are raised once,
//!   after every entry has been examined, and carry the full itemized list.
//!
//! - **`Result<T>`**: alias for `std::result::Result<T, Error>`.
//!
//! No component terminates the process. The binary converts any `Error` into
//! a non-zero exit status after printing it.

use thiserror::Error;

use crate::catalog::CatalogReport;
use crate::provenance::ProvenanceGap;
use crate::report::Findings;

/// Main error type for bundle-reconcile operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration document is missing a field or has the wrong shape.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The registry mapping must hold exactly one source/target pair.
    #[error("Configuration error: registry mapping must have exactly one entry, got {count}")]
    InvalidRegistryMapping { count: usize },

    /// An image reference has fewer than three path segments.
    #[error("Malformed image reference: '{value}' (expected registry/org/repo[@digest])")]
    MalformedReference { value: String },

    /// One or more images could not be resolved to a signed digest with git
    /// labels. Raised only after every entry was processed.
    #[error("Provenance resolution failed for image tag '{tag}' ({} component(s)):\n{findings}", findings.len())]
    ProvenanceResolution {
        tag: String,
        findings: Findings<ProvenanceGap>,
    },

    /// Catalog completeness validation found missing or misplaced bundles.
    #[error("Catalog validation failed:\n{report}")]
    CatalogValidation { report: CatalogReport },

    /// The registry answered with something other than the expected payload.
    #[error("Registry error for {url}: {message}")]
    Registry { url: String, message: String },

    /// An HTTP request could not be completed.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// An error occurred while merging structured documents.
    #[error("Merge operation error: {operation} - {message}")]
    Merge { operation: String, message: String },

    /// A document does not contain a field the engine needs.
    #[error("Document error in {path}: {message}")]
    Document { path: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Version parsing error: {0}")]
    Semver(#[from] semver::Error),
}

impl Error {
    /// Shorthand for a configuration error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            hint: None,
        }
    }

    /// Shorthand for a document error.
    pub fn document(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Document {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
