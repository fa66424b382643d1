//! Orchestration of the two reconciliation runs.
//!
//! ## Overview
//!
//! - [`bundle`]: `bundle-patch`. Pins the operator image of a bundle CSV to
//!   its latest signed digest, pulls the operand list from the operator
//!   repository at the matching commit and rewrites the CSV, the bundle
//!   annotations and the bundle build arguments.
//! - [`operator`]: `sync-operator`. Aligns the operator repository's operand
//!   map and nudging file with the bundle patch, pins every operand to its
//!   latest signed digest and records the git provenance in the manifests
//!   config.
//!
//! Both runs load all their inputs first, then edit in memory, and only
//! write once every step succeeded. Both runs finish by applying the requested
//! push-pipeline gate operation.

use std::path::Path;

use log::info;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::document;
use crate::error::{Error, Result};
use crate::gate::{self, GateOperation};
use crate::image::{entries_from_value, ImageEntry};

pub mod bundle;
pub mod operator;

pub use bundle::{BundleOutcome, BundlePaths, BundleProcessor, BundleRequest};
pub use operator::{OperatorOutcome, OperatorPaths, OperatorProcessor, OperatorRequest};

/// Log a stage banner.
fn stage(title: &str) {
    info!("");
    info!("{}", "=".repeat(77));
    info!("{}", title);
    info!("{}", "=".repeat(77));
}

/// Push pipeline loaded for gating, written back only when it changed.
struct GatedPipeline {
    document: YamlValue,
    changed: bool,
}

impl GatedPipeline {
    fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            document: document::load(path)?,
            changed: false,
        })
    }

    fn apply(&mut self, op: GateOperation) -> Result<()> {
        self.changed = gate::apply_to_pipeline(&mut self.document, op)?;
        Ok(())
    }

    fn save_if_changed(&self, path: &Path) -> Result<bool> {
        if self.changed {
            document::save(&self.document, path)?;
        }
        Ok(self.changed)
    }
}

/// Image entries under the top-level `relatedImages` key of a document.
fn related_images(doc: &YamlValue, origin: &str) -> Result<Vec<ImageEntry>> {
    let list = doc
        .get("relatedImages")
        .ok_or_else(|| Error::document(origin, "missing field 'relatedImages'"))?;
    entries_from_value(list).map_err(|e| Error::document(origin, e.to_string()))
}

/// `{key: value}` as a YAML mapping.
fn single_entry(key: &str, value: YamlValue) -> YamlValue {
    let mut mapping = Mapping::new();
    mapping.insert(key.into(), value);
    YamlValue::Mapping(mapping)
}
