//! # Cluster Info Source
//!
//! [`ClustersInfoSource`] backed by the Kubernetes API of the cluster the
//! exporter runs against: API server version, discovered API resources and the
//! size and sync time of the application cache.
//!
//! Discovery is done request by request (core versions, group list, then one
//! resource list per group) so that every API call shows up in
//! `app_k8s_request_total`.

use crate::observability::metrics::{ClusterInfo, ClustersInfoSource, ControllerMetrics};
use crate::store::ReflectorLister;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;

/// Clusters info fetched live from the local cluster
pub struct KubeClustersInfoSource {
    client: Client,
    server: String,
    lister: ReflectorLister,
    metrics: ControllerMetrics,
}

impl KubeClustersInfoSource {
    pub fn new(
        client: Client,
        server: String,
        lister: ReflectorLister,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            client,
            server,
            lister,
            metrics,
        }
    }

    /// Count one API call in `app_k8s_request_total`
    ///
    /// `response_code` is the HTTP status for successes and API errors, and
    /// `"error"` when no response was received (connection, TLS or decoding failures).
    fn record_request<T>(&self, result: &kube::Result<T>, verb: &str, resource_kind: &str) {
        self.metrics.inc_kubernetes_request(
            None,
            &self.server,
            &response_code(result),
            verb,
            resource_kind,
            "",
        );
    }

    /// Number of top-level API resources served in the preferred version of
    /// every API group, core group included
    async fn count_apis(&self) -> Result<u64> {
        let core_versions = self.client.list_core_api_versions().await;
        self.record_request(&core_versions, "List", "APIVersions");
        let core_versions = core_versions.context("Failed to list core API versions")?;

        let mut count = 0;
        for version in &core_versions.versions {
            let resources = self.client.list_core_api_resources(version).await;
            self.record_request(&resources, "List", "APIResource");
            count += top_level_resources(
                &resources.with_context(|| format!("Failed to list core {version} resources"))?,
            );
        }

        let groups = self.client.list_api_groups().await;
        self.record_request(&groups, "List", "APIGroup");
        let groups = groups.context("Failed to list API groups")?;

        for group in &groups.groups {
            let Some(group_version) = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
                .map(|version| version.group_version.as_str())
            else {
                continue;
            };
            let resources = self.client.list_api_group_resources(group_version).await;
            self.record_request(&resources, "List", "APIResource");
            count += top_level_resources(
                &resources.with_context(|| format!("Failed to list {group_version} resources"))?,
            );
        }

        Ok(count)
    }
}

fn response_code<T>(result: &kube::Result<T>) -> String {
    match result {
        Ok(_) => "200".to_string(),
        Err(kube::Error::Api(response)) => response.code.to_string(),
        Err(_) => "error".to_string(),
    }
}

/// Resources in `list`, subresources such as `pods/log` excluded
fn top_level_resources(list: &APIResourceList) -> u64 {
    list.resources
        .iter()
        .filter(|resource| !resource.name.contains('/'))
        .count() as u64
}

impl std::fmt::Debug for KubeClustersInfoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClustersInfoSource")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ClustersInfoSource for KubeClustersInfoSource {
    async fn clusters_info(&self) -> Result<Vec<ClusterInfo>> {
        let version = self.client.apiserver_version().await;
        self.record_request(&version, "Get", "Version");
        let version = version.context("Failed to fetch API server version")?;

        let apis_count = self.count_apis().await?;

        Ok(vec![ClusterInfo {
            server: self.server.clone(),
            k8s_version: version.git_version,
            resources_count: self.lister.len() as u64,
            apis_count,
            last_cache_sync_time: self.lister.last_synced(),
        }])
    }
}
