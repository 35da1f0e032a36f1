use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use kube::Client;
use tokio::sync::Mutex;

use crate::error::Error;

/// One API resource kind together with its bare API group.
#[derive(Clone, Debug)]
pub struct GroupResource {
    pub api_group: String,
    pub api_resource: APIResource,
}

impl GroupResource {
    pub fn full_name(&self) -> String {
        if self.api_group.is_empty() {
            self.api_resource.name.clone()
        } else {
            format!("{}.{}", self.api_resource.name, self.api_group)
        }
    }

    fn matches(&self, query: &str) -> bool {
        let resource = &self.api_resource;
        resource.name == query
            || resource.singular_name == query
            || resource.kind.eq_ignore_ascii_case(query)
            || self.full_name() == query
            || resource
                .short_names
                .as_ref()
                .map_or(false, |names| names.iter().any(|n| n == query))
    }
}

#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Forgets anything cached so that the next call hits the API server.
    async fn invalidate(&self);

    async fn server_preferred_resources(&self) -> Result<Vec<APIResourceList>>;

    async fn server_preferred_namespaced_resources(&self) -> Result<Vec<APIResourceList>> {
        let mut lists = self.server_preferred_resources().await?;
        for list in lists.iter_mut() {
            list.resources.retain(|r| r.namespaced);
        }
        Ok(lists)
    }
}

pub struct KubeDiscovery {
    client: Client,
    cache: Mutex<Option<Vec<APIResourceList>>>,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
        }
    }

    async fn discover(&self) -> Result<Vec<APIResourceList>> {
        let client = &self.client;
        let api_groups = client.list_api_groups().await?;
        let core_api_versions = client.list_core_api_versions().await?;
        let group_resources = try_join_all(
            api_groups
                .groups
                .iter()
                .filter_map(|g| g.preferred_version.clone())
                .map(|g| {
                    let version = g.group_version;
                    async move { client.list_api_group_resources(&version).await }
                }),
        )
        .await?;
        let core_resources = try_join_all(
            core_api_versions
                .versions
                .first()
                .map(|version| async move { client.list_core_api_resources(version).await }),
        )
        .await?;
        Ok(core_resources
            .into_iter()
            .chain(group_resources)
            .collect::<Vec<APIResourceList>>())
    }
}

#[async_trait]
impl DiscoveryClient for KubeDiscovery {
    async fn invalidate(&self) {
        self.cache.lock().await.take();
    }

    async fn server_preferred_resources(&self) -> Result<Vec<APIResourceList>> {
        let mut cache = self.cache.lock().await;
        if let Some(lists) = cache.as_ref() {
            return Ok(lists.clone());
        }
        let lists = self.discover().await?;
        *cache = Some(lists.clone());
        Ok(lists)
    }
}

/// Splits `group/version` (or a bare core `version`) into its group and version.
pub fn parse_group_version(group_version: &str) -> Result<(String, String), Error> {
    if group_version.is_empty() {
        return Ok((String::new(), String::new()));
    }
    match group_version.split('/').collect::<Vec<&str>>()[..] {
        [version] => Ok((String::new(), version.to_string())),
        [group, version] => Ok((group.to_string(), version.to_string())),
        _ => Err(Error::InvalidGroupVersion(group_version.to_string())),
    }
}

pub async fn fetch_available_group_resources(
    discovery: &dyn DiscoveryClient,
    namespaced: bool,
    include_subresources: bool,
) -> Result<Vec<GroupResource>> {
    discovery.invalidate().await;

    let lists = if namespaced {
        discovery.server_preferred_namespaced_resources().await
    } else {
        discovery.server_preferred_resources().await
    }
    .context("get preferred resources")?;

    let mut group_resources = Vec::new();
    for list in lists {
        if list.resources.is_empty() {
            continue;
        }
        let (group, _) = match parse_group_version(&list.group_version) {
            Ok(gv) => gv,
            Err(e) => {
                tracing::warn!("Cannot parse groupVersion: {}", e);
                continue;
            }
        };
        group_resources.extend(
            list.resources
                .into_iter()
                .filter(|r| !r.verbs.is_empty())
                .filter(|r| include_subresources || !r.name.contains('/'))
                .map(|r| GroupResource {
                    api_group: group.clone(),
                    api_resource: r,
                }),
        );
    }
    Ok(group_resources)
}

/// Maps a user supplied resource (plural, singular, short name, kind or
/// `resource.group`) to the plural resource name used in policy rules.
pub fn resolve_resource(catalog: &[GroupResource], query: &str) -> Result<String, Error> {
    catalog
        .iter()
        .find(|gr| gr.matches(query))
        .map(|gr| gr.api_resource.name.clone())
        .ok_or_else(|| Error::UnknownResource(query.to_string()))
}
