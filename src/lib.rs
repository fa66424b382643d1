//! # Bundle Reconcile Library
//!
//! This library reconciles operator bundle manifests with the images a build
//! actually produced. It is used by the `bundle-reconcile` command-line tool
//! but every component can be driven on its own.
//!
//! ## Quick Example
//!
//! ```
//! use bundle_reconcile::merge::keyed::{keyed_merge, MergeScheme};
//!
//! let target: serde_yaml::Value = serde_yaml::from_str(
//!     "env:\n- name: A\n  value: '1'\n- name: B\n  value: '2'\n",
//! ).unwrap();
//! let source: serde_yaml::Value = serde_yaml::from_str(
//!     "env:\n- name: B\n  value: '3'\n- name: C\n  value: '4'\n",
//! ).unwrap();
//!
//! let scheme = MergeScheme::keyed("$.env", "name").unwrap();
//! let merged = keyed_merge(&target, &source, &scheme);
//! assert_eq!(merged["env"].as_sequence().unwrap().len(), 3);
//! assert_eq!(merged["env"][1]["value"], "3");
//! ```
//!
//! ## Core Concepts
//!
//! - **Image references (`image`)**: `registry/org/repo[@digest]` values and
//!   the named image entries found in manifests.
//! - **Provenance (`provenance`, `registry`)**: resolves a symbolic tag to the
//!   newest signed digest and its git url/commit labels. All failures are
//!   collected before the run fails.
//! - **Keyed merge (`merge`)**: structural merge of YAML trees where chosen
//!   lists are matched element by element on a key field.
//! - **Remapping (`remap`)**: rewrites build registry and repo paths into
//!   their release equivalents.
//! - **Manifest patching (`manifest`)**: targeted CSV edits plus keyed merge of
//!   the related images.
//! - **Pipeline gate (`gate`)**: toggles an always-false guard clause in a
//!   push pipeline trigger.
//! - **Catalog validation (`catalog`)**: checks that every shipped bundle is
//!   present in the catalog of every supported platform.
//!
//! ## Execution Flow
//!
//! The [`processors`] module wires these components into the two
//! reconciliation runs:
//!
//! 1.  **Load**: read every input document.
//! 2.  **Resolve**: pin each image to its latest signed digest.
//! 3.  **Patch**: merge the resolved images and provenance into the documents.
//! 4.  **Write**: save the documents, only once every step succeeded.
//! 5.  **Gate**: enable or disable the push pipeline.

pub mod catalog;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod gate;
pub mod image;
pub mod manifest;
pub mod merge;
pub mod output;
pub mod processors;
pub mod provenance;
pub mod registry;
pub mod remap;
pub mod report;
pub mod version;
