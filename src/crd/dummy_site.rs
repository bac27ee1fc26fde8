//! DummySite Custom Resource Definition

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API group of the DummySite resource
pub const GROUP: &str = "stable.example.com";

/// API version of the DummySite resource
pub const VERSION: &str = "v1";

/// Plural name of the DummySite resource
pub const PLURAL: &str = "dummysites";

/// DummySite resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "stable.example.com",
    version = "v1",
    kind = "DummySite",
    plural = "dummysites",
    singular = "dummysite",
    shortname = "ds",
    namespaced,
    status = "DummySiteStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "URL", "type": "string", "jsonPath": ".status.url"}"#,
    printcolumn = r#"{"name": "Source", "type": "string", "jsonPath": ".spec.website_url"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
pub struct DummySiteSpec {
    /// URL of the website whose content is mirrored
    #[serde(alias = "websiteUrl")]
    pub website_url: String,
}

/// Lifecycle phase of a DummySite
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SitePhase {
    /// Not yet reconciled
    #[default]
    Pending,
    /// Reconciliation in progress
    Processing,
    /// All child objects applied
    Ready,
    /// Last reconciliation failed
    Failed,
}

impl SitePhase {
    /// Whether a reconciliation run may end in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, SitePhase::Ready | SitePhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SitePhase::Pending => "Pending",
            SitePhase::Processing => "Processing",
            SitePhase::Ready => "Ready",
            SitePhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for SitePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DummySite status
///
/// Serialized as a merge patch: `url` is always sent so that it is cleared
/// outside of `Ready`, and a `None` message is sent as `null` to remove it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DummySiteStatus {
    /// Current phase (Pending, Processing, Ready, Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<SitePhase>,

    /// Externally reachable URL once Ready, empty otherwise
    #[serde(default)]
    pub url: String,

    /// Error message of the last failed run
    #[serde(default)]
    pub message: Option<String>,

    /// Last update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl DummySiteStatus {
    /// Status written at the start of every run
    pub fn processing() -> Self {
        Self::with_phase(SitePhase::Processing, String::new(), None)
    }

    /// Status written after all child objects were applied
    pub fn ready(url: impl Into<String>) -> Self {
        Self::with_phase(SitePhase::Ready, url.into(), None)
    }

    /// Status written after a failed run
    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_phase(SitePhase::Failed, String::new(), Some(message.into()))
    }

    fn with_phase(phase: SitePhase, url: String, message: Option<String>) -> Self {
        Self {
            phase: Some(phase),
            url,
            message,
            last_update_time: Some(Utc::now()),
        }
    }
}

/// Change notification for a DummySite, decoded at the watch boundary
#[derive(Clone, Debug, PartialEq)]
pub enum SiteEvent {
    Added(DummySite),
    Modified(DummySite),
    Deleted(DummySite),
}

impl SiteEvent {
    /// The DummySite snapshot carried by the event
    pub fn site(&self) -> &DummySite {
        match self {
            SiteEvent::Added(site) | SiteEvent::Modified(site) | SiteEvent::Deleted(site) => site,
        }
    }

    /// Event type as reported by the API server
    pub fn kind(&self) -> &'static str {
        match self {
            SiteEvent::Added(_) => "ADDED",
            SiteEvent::Modified(_) => "MODIFIED",
            SiteEvent::Deleted(_) => "DELETED",
        }
    }
}
