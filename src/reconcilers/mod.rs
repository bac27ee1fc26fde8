//! Reconciliation logic for custom resources

pub mod site;

pub use site::{apply_manifest, reconcile, ApplyOutcome, Trigger};
