use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::ListParams;
use kube::{Api, Client};

use crate::constants::{CLUSTER_ROLE, ROLE};
use crate::subject::{RoleRef, SubjectAccess};

#[async_trait]
pub trait RbacLister: Send + Sync {
    async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>>;
    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>>;
    async fn list_roles(&self, namespace: &str) -> Result<Vec<Role>>;
    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>>;
}

pub struct KubeRbac {
    client: Client,
}

impl KubeRbac {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RbacLister for KubeRbac {
    async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_roles(&self, namespace: &str) -> Result<Vec<Role>> {
        let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }
}

/// Resolves which subjects may access `resource` (optionally the instance
/// `resource_name`) through ClusterRoleBindings and, if a namespace is given,
/// through the RoleBindings of that namespace.
///
/// Without a namespace, failing to read cluster wide RBAC objects is fatal.
/// With a namespace it only makes the result incomplete.
pub async fn get_subject_access(
    rbac: &dyn RbacLister,
    resource: &str,
    resource_name: &str,
    namespace: Option<&str>,
) -> Result<SubjectAccess> {
    let mut sa = SubjectAccess::new(resource, resource_name);

    let cluster_scope = match fetch_matching_cluster_roles(rbac, &mut sa).await {
        Ok(()) => resolve_cluster_role_bindings(rbac, &mut sa).await,
        Err(e) => Err(e),
    };
    if let Err(e) = cluster_scope {
        if namespace.is_none() {
            return Err(e);
        }
        tracing::warn!("incomplete result: {:#}", e);
    }

    let namespace = match namespace {
        Some(namespace) => namespace,
        None => {
            tracing::info!("Skipping roles and rolebindings because namespace is missing");
            return Ok(sa);
        }
    };

    fetch_matching_roles(rbac, &mut sa, namespace).await?;
    resolve_role_bindings(rbac, &mut sa, namespace).await?;

    Ok(sa)
}

async fn fetch_matching_cluster_roles(rbac: &dyn RbacLister, sa: &mut SubjectAccess) -> Result<()> {
    tracing::debug!("fetching ClusterRoles");
    let roles = rbac.list_cluster_roles().await.context("list ClusterRoles")?;
    for role in roles {
        let r = RoleRef {
            name: role.metadata.name.unwrap_or_default(),
            kind: CLUSTER_ROLE.to_string(),
        };
        for rule in role.rules.iter().flatten() {
            sa.match_rules(&r, rule);
        }
    }
    Ok(())
}

async fn resolve_cluster_role_bindings(rbac: &dyn RbacLister, sa: &mut SubjectAccess) -> Result<()> {
    tracing::debug!("fetching ClusterRoleBindings");
    let bindings = rbac
        .list_cluster_role_bindings()
        .await
        .context("list ClusterRoleBindings")?;
    for binding in bindings {
        let r = RoleRef {
            name: binding.role_ref.name,
            kind: binding.role_ref.kind,
        };
        sa.resolve_role_ref(&r, binding.subjects.as_deref().unwrap_or_default());
    }
    Ok(())
}

async fn fetch_matching_roles(
    rbac: &dyn RbacLister,
    sa: &mut SubjectAccess,
    namespace: &str,
) -> Result<()> {
    tracing::debug!("fetching Roles for namespace {}", namespace);
    let roles = rbac
        .list_roles(namespace)
        .await
        .with_context(|| format!("list Roles in namespace {}", namespace))?;
    for role in roles {
        let r = RoleRef {
            name: role.metadata.name.unwrap_or_default(),
            kind: ROLE.to_string(),
        };
        for rule in role.rules.iter().flatten() {
            sa.match_rules(&r, rule);
        }
    }
    Ok(())
}

async fn resolve_role_bindings(
    rbac: &dyn RbacLister,
    sa: &mut SubjectAccess,
    namespace: &str,
) -> Result<()> {
    tracing::debug!("fetching RoleBindings for namespace {}", namespace);
    let bindings = rbac
        .list_role_bindings(namespace)
        .await
        .with_context(|| format!("list RoleBindings in namespace {}", namespace))?;
    for binding in bindings {
        // May point at a Role or at a ClusterRole, the kind keeps them apart.
        let r = RoleRef {
            name: binding.role_ref.name,
            kind: binding.role_ref.kind,
        };
        sa.resolve_role_ref(&r, binding.subjects.as_deref().unwrap_or_default());
    }
    Ok(())
}
