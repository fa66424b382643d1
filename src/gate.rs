//! # Push Pipeline Gate
//!
//! CI push pipelines are triggered by a CEL expression stored in the
//! `pipelinesascode.tekton.dev/on-cel-expression` annotation. Nightly builds
//! must not trigger them, so the gate prepends an always-false guard clause:
//!
//! ```text
//! "non-existent-file.non-existent-ext".pathChanged() && <original expression>
//! ```
//!
//! Enabling strips the clause again. Both directions are idempotent.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde_yaml::Value as YamlValue;

use crate::document::lookup_mut;
use crate::error::{Error, Result};

/// Annotation holding the trigger expression.
pub const CEL_ANNOTATION: &str = "pipelinesascode.tekton.dev/on-cel-expression";

const SENTINEL_FILE: &str = "non-existent-file.non-existent-ext";

/// Guard clause that can never be true.
pub fn sentinel() -> String {
    format!("\"{}\".pathChanged() && ", SENTINEL_FILE)
}

/// Requested state of the push pipeline trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateOperation {
    #[default]
    Enable,
    Disable,
}

impl FromStr for GateOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "enable" => Ok(GateOperation::Enable),
            "disable" => Ok(GateOperation::Disable),
            other => Err(Error::ConfigParse {
                message: format!("Unknown pipeline operation '{}'", other),
                hint: Some("Use 'enable' or 'disable'".to_string()),
            }),
        }
    }
}

impl fmt::Display for GateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GateOperation::Enable => "enable",
            GateOperation::Disable => "disable",
        })
    }
}

/// Apply `op` to a CEL expression, returning whether it changed.
///
/// ```
/// use bundle_reconcile::gate::{toggle, GateOperation};
///
/// let (changed, disabled) = toggle("event == \"push\"", GateOperation::Disable);
/// assert!(changed);
/// let (changed, again) = toggle(&disabled, GateOperation::Disable);
/// assert!(!changed);
/// assert_eq!(again, disabled);
/// ```
pub fn toggle(cel: &str, op: GateOperation) -> (bool, String) {
    let disabled = cel.contains(SENTINEL_FILE);
    match op {
        GateOperation::Enable if disabled => {
            let enabled = cel.replace(&sentinel(), "");
            (enabled != cel, enabled)
        }
        GateOperation::Disable if !disabled => (true, format!("{}{}", sentinel(), cel)),
        _ => (false, cel.to_string()),
    }
}

/// Apply `op` to the trigger annotation of a pipeline document in place.
///
/// # Errors
///
/// Returns `Error::ConfigParse` when the pipeline has no trigger annotation.
pub fn apply_to_pipeline(pipeline: &mut YamlValue, op: GateOperation) -> Result<bool> {
    info!("Push pipeline operation requested: {}", op);

    let path = format!("metadata.annotations[\"{}\"]", CEL_ANNOTATION);
    let annotation = lookup_mut(pipeline, &path).ok_or_else(|| Error::ConfigParse {
        message: format!("Pipeline has no metadata.annotations.{} annotation", CEL_ANNOTATION),
        hint: Some("Point the pipeline path at the Tekton push pipeline definition".to_string()),
    })?;
    let current = annotation.as_str().ok_or_else(|| {
        Error::config(format!("Pipeline annotation {} is not a string", CEL_ANNOTATION))
    })?;
    debug!("Current CEL expression before update: {}", current);

    let (changed, updated) = toggle(current, op);
    if changed {
        info!("Push pipeline trigger {}d", op);
        debug!("CEL expression after update: {}", updated);
        *annotation = YamlValue::String(updated);
    } else {
        info!("No change needed for push pipeline CEL expression, already {}d", op);
    }
    Ok(changed)
}
