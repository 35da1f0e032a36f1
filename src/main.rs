use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod check;
mod commands;
mod config;
mod constants;
mod diff;
mod discovery;
mod error;
mod formatter;
mod rbac;
mod subject;
mod types;

use commands::Clients;

/// Review the access matrix of Kubernetes resources and subjects
#[derive(Parser)]
#[command(name = "kubectl-access_matrix", version)]
struct Cli {
    #[command(flatten)]
    options: config::Options,

    /// Log filter, e.g. warn or kubectl_access_matrix=debug
    #[arg(long, global = true, env = "ACCESS_MATRIX_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the subjects with access to a resource kind, or to one named resource
    #[command(visible_aliases = ["for", "for-resource"])]
    Resource {
        resource: String,
        resource_name: Option<String>,
    },
    /// Show access differences between the given flags and the flags patched with FLAG=VALUE overrides
    Diff {
        #[arg(value_name = "FLAG=VALUE")]
        overrides: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        options,
        log_level,
        command,
    } = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_level).context("parse log level")?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    options.validate()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling outstanding checks");
                cancel.cancel();
            }
        }
    });

    let mut out = std::io::stdout();
    let colored = out.is_terminal();

    match command {
        None => {
            let clients = Clients::connect(&options).await?;
            let access = commands::resource_access(&clients, &options, cancel).await?;
            commands::print_resource_access(&mut out, &access, &options, colored)?;
        }
        Some(Command::Resource {
            resource,
            resource_name,
        }) => {
            let clients = Clients::connect(&options).await?;
            let access = commands::subject_access(
                &clients,
                &options,
                &resource,
                resource_name.as_deref().unwrap_or_default(),
            )
            .await?;
            commands::print_subject_access(&mut out, &access, &options, colored)?;
        }
        Some(Command::Diff { overrides }) => {
            let patched = options.with_overrides(&overrides)?;

            let left = commands::resource_access(&Clients::connect(&options).await?, &options, cancel.clone())
                .await
                .context("original options failed")?;
            let right = commands::resource_access(&Clients::connect(&patched).await?, &patched, cancel)
                .await
                .context("modified options failed")?;
            commands::print_diff(&mut out, &left, &right, &options, colored)?;
        }
    }

    Ok(())
}
