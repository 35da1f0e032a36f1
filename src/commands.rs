use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::check::{check_resource_access, AccessReviewer, SelfSubjectReviewer};
use crate::config::{Options, OutputFormat};
use crate::diff::diff;
use crate::discovery::{
    fetch_available_group_resources, resolve_resource, DiscoveryClient, KubeDiscovery,
};
use crate::rbac::{get_subject_access, KubeRbac, RbacLister};
use crate::subject::SubjectAccess;
use crate::types::ResourceAccess;

/// API collaborators for one set of options.
pub struct Clients {
    pub discovery: Arc<dyn DiscoveryClient>,
    pub reviewer: Arc<dyn AccessReviewer>,
    pub rbac: Arc<dyn RbacLister>,
}

impl Clients {
    pub async fn connect(opts: &Options) -> Result<Self> {
        let client = opts.kube_client().await.context("get kube client")?;
        Ok(Self {
            discovery: Arc::new(KubeDiscovery::new(client.clone())),
            reviewer: Arc::new(SelfSubjectReviewer::new(client.clone())),
            rbac: Arc::new(KubeRbac::new(client)),
        })
    }
}

pub async fn resource_access(
    clients: &Clients,
    opts: &Options,
    cancel: CancellationToken,
) -> Result<ResourceAccess> {
    let resources = fetch_available_group_resources(
        clients.discovery.as_ref(),
        opts.namespace().is_some(),
        opts.include_subresources,
    )
    .await
    .context("fetch available group resources")?;
    tracing::debug!("{} group resources to check", resources.len());

    let access = check_resource_access(
        clients.reviewer.clone(),
        &resources,
        &opts.expanded_verbs(),
        opts.namespace(),
        cancel.clone(),
    )
    .await;
    // Unchecked verbs would render as n/a, or as denied in a diff.
    if cancel.is_cancelled() {
        bail!(
            "access check interrupted after {} resources",
            access.items().len()
        );
    }
    Ok(access)
}

pub fn print_resource_access<W: Write>(
    out: &mut W,
    access: &ResourceAccess,
    opts: &Options,
    colored: bool,
) -> Result<()> {
    access
        .to_table(&opts.expanded_verbs())
        .render(out, opts.output_format()?, colored)?;
    if opts.namespace().is_none() {
        writeln!(
            out,
            "No namespace given, this implies cluster scope (try -n if this is not intended)"
        )?;
    }
    Ok(())
}

pub async fn subject_access(
    clients: &Clients,
    opts: &Options,
    resource: &str,
    resource_name: &str,
) -> Result<SubjectAccess> {
    let catalog = fetch_available_group_resources(clients.discovery.as_ref(), false, true)
        .await
        .context("fetch available group resources")?;
    let resource = resolve_resource(&catalog, resource).context("determine requested resource")?;

    get_subject_access(clients.rbac.as_ref(), &resource, resource_name, opts.namespace())
        .await
        .context("get subject access")
}

pub fn print_subject_access<W: Write>(
    out: &mut W,
    access: &SubjectAccess,
    opts: &Options,
    colored: bool,
) -> Result<()> {
    tracing::debug!("{} subjects with access to {}", access.get().len(), access.resource);
    if access.is_empty() {
        tracing::warn!("No subjects with access found. This most likely means that you have insufficient rights to review authorization.");
        return Ok(());
    }
    access
        .to_table(&opts.expanded_verbs())
        .render(out, opts.output_format()?, colored)?;
    if opts.namespace().is_none() {
        writeln!(
            out,
            "Only ClusterRoleBindings are considered, because no namespace is given."
        )?;
    }
    Ok(())
}

pub fn print_diff<W: Write>(
    out: &mut W,
    left: &ResourceAccess,
    right: &ResourceAccess,
    opts: &Options,
    colored: bool,
) -> Result<()> {
    let table = diff(left, right, &opts.expanded_verbs());
    if table.is_empty() {
        tracing::info!("No differences in access found");
    }
    table.render(out, OutputFormat::LeftRight, colored)?;
    Ok(())
}
