use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use k8s_openapi::api::authorization::v1::SelfSubjectAccessReview;
use kube::api::PostParams;
use kube::{Api, Client};
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::constants::MAX_INFLIGHT_REVIEWS;
use crate::discovery::GroupResource;
use crate::types::{Access, ResourceAccess, ResourceAccessItem};

/// Asks the API server whether the caller may perform `verb` on a resource.
#[async_trait]
pub trait AccessReviewer: Send + Sync {
    async fn review(
        &self,
        verb: &str,
        resource: &str,
        group: &str,
        namespace: &str,
    ) -> Result<bool>;
}

pub struct SelfSubjectReviewer {
    api: Api<SelfSubjectAccessReview>,
}

impl SelfSubjectReviewer {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl AccessReviewer for SelfSubjectReviewer {
    async fn review(
        &self,
        verb: &str,
        resource: &str,
        group: &str,
        namespace: &str,
    ) -> Result<bool> {
        let ssar: SelfSubjectAccessReview = serde_json::from_value(json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": "SelfSubjectAccessReview",
            "metadata": {},
            "spec": {
                "resourceAttributes": {
                  "group": group,
                  "resource": resource,
                  "namespace": namespace,
                  "verb": verb,
                },
            }
        }))?;

        let res = self.api.create(&PostParams::default(), &ssar).await?;
        let status = res
            .status
            .ok_or_else(|| anyhow!("K8s answered with an empty status"))?;
        Ok(status.allowed)
    }
}

async fn check_resource(
    reviewer: Arc<dyn AccessReviewer>,
    resource: GroupResource,
    verbs: Arc<Vec<String>>,
    mut namespace: String,
    cancel: CancellationToken,
) -> ResourceAccessItem {
    let name = resource.full_name();
    tracing::debug!("Checking access for {}", name);

    // A namespace on a review for a cluster-scoped resource reports allowed
    // even when it is forbidden.
    if !resource.api_resource.namespaced {
        namespace.clear();
    }

    let supported: HashSet<&str> = resource.api_resource.verbs.iter().map(String::as_str).collect();
    let mut access = HashMap::with_capacity(verbs.len());
    for verb in verbs.iter() {
        if cancel.is_cancelled() {
            break;
        }
        if !supported.contains(verb.as_str()) {
            access.insert(verb.clone(), Access::NotApplicable);
            continue;
        }
        let outcome = match reviewer
            .review(verb, &resource.api_resource.name, &resource.api_group, &namespace)
            .await
        {
            Ok(true) => Access::Allowed,
            Ok(false) => Access::Denied,
            Err(e) => {
                tracing::debug!("Review of {} {} failed: {}", verb, name, e);
                Access::RequestErr
            }
        };
        access.insert(verb.clone(), outcome);
    }

    ResourceAccessItem { name, access }
}

/// Reviews every requested verb on every resource, with at most
/// `MAX_INFLIGHT_REVIEWS` resources being checked at once.
///
/// Once `cancel` fires no further reviews are started; resources already in
/// flight keep the outcomes they collected so far.
pub async fn check_resource_access(
    reviewer: Arc<dyn AccessReviewer>,
    resources: &[GroupResource],
    verbs: &[String],
    namespace: Option<&str>,
    cancel: CancellationToken,
) -> ResourceAccess {
    let semaphore = Arc::new(Semaphore::new(MAX_INFLIGHT_REVIEWS));
    let verbs = Arc::new(verbs.to_vec());
    let namespace = namespace.unwrap_or_default().to_string();

    let handles: Vec<_> = resources
        .iter()
        .cloned()
        .map(|resource| {
            let reviewer = reviewer.clone();
            let semaphore = semaphore.clone();
            let verbs = verbs.clone();
            let namespace = namespace.clone();
            let cancel = cancel.clone();
            task::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return None,
                    permit = semaphore.acquire_owned() => permit.ok()?,
                };
                Some(check_resource(reviewer, resource, verbs, namespace, cancel).await)
            })
        })
        .collect();

    let items = join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Access check task failed: {}", e);
                None
            }
        })
        .collect::<Vec<ResourceAccessItem>>();

    ResourceAccess::new(items)
}
