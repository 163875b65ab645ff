//! # Custom Resource Definitions
//!
//! Read-only view of the GitOps `Application` resource consumed by the metrics exporter.
//!
//! Only the fields the exporter reads are modelled; everything else in the
//! upstream resource is ignored during deserialization.

mod status;

pub use status::*;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Project assigned to applications that do not name one explicitly.
pub const DEFAULT_PROJECT: &str = "default";

/// Application Custom Resource
///
/// # Example
///
/// ```yaml
/// apiVersion: argoproj.io/v1alpha1
/// kind: Application
/// metadata:
///   name: guestbook
///   namespace: prod
/// spec:
///   project: default
///   source:
///     repoURL: https://github.com/example/guestbook.git
///     path: guestbook
///     targetRevision: HEAD
///   destination:
///     server: https://kubernetes.default.svc
///     namespace: prod
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Application",
    group = "argoproj.io",
    version = "v1alpha1",
    namespaced,
    status = "ApplicationStatus",
    shortname = "app"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Project the application belongs to. Empty means [`DEFAULT_PROJECT`].
    #[serde(default)]
    pub project: String,
    /// Where the manifests come from
    #[serde(default)]
    pub source: ApplicationSource,
    /// Where the manifests are deployed to
    #[serde(default)]
    pub destination: ApplicationDestination,
}

impl ApplicationSpec {
    /// Project name with the empty value mapped to [`DEFAULT_PROJECT`]
    pub fn project(&self) -> &str {
        if self.project.is_empty() {
            DEFAULT_PROJECT
        } else {
            &self.project
        }
    }
}

/// Git or Helm repository holding the application manifests
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(default, rename = "repoURL")]
    pub repo_url: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub target_revision: Option<String>,
}

/// Target cluster and namespace
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub namespace: String,
}

impl Application {
    pub fn namespace_str(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn name_str(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Raw sync status code, empty when the controller has not reported one yet
    pub fn sync_status(&self) -> &str {
        self.status
            .as_ref()
            .map_or("", |status| status.sync.status.as_str())
    }

    /// Raw health status code, empty when the controller has not reported one yet
    pub fn health_status(&self) -> &str {
        self.status
            .as_ref()
            .map_or("", |status| status.health.status.as_str())
    }

    /// Creation time in seconds since the Unix epoch, 0 when unset
    pub fn created_unix_seconds(&self) -> i64 {
        creation_unix_seconds(&self.metadata)
    }
}

/// Extract `metadata.creationTimestamp` as Unix seconds, 0 when unset.
pub fn creation_unix_seconds(metadata: &ObjectMeta) -> i64 {
    metadata
        .creation_timestamp
        .as_ref()
        .map_or(0, |time| time.0.timestamp())
}
