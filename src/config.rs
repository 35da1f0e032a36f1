use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Args;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::constants::{self, ALL, ALL_ALIAS, ASCII_TABLE, DEFAULT_VERBS, ICON_TABLE};
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    IconTable,
    AsciiTable,
    /// Markers for the diff command, not selectable on the command line.
    LeftRight,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ICON_TABLE => Ok(OutputFormat::IconTable),
            ASCII_TABLE => Ok(OutputFormat::AsciiTable),
            other => Err(Error::InvalidOutputFormat(other.to_string())),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct Options {
    /// Show access for verbs out of create, get, list, watch, update, patch, delete, deletecollection ('*' or 'all' for every verb)
    #[arg(long, global = true, value_delimiter = ',', default_values = DEFAULT_VERBS)]
    pub verbs: Vec<String>,

    /// If present, the namespace scope for this request
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Output format, one of icon-table, ascii-table
    #[arg(short, long, global = true, default_value = ICON_TABLE)]
    pub output: String,

    /// Username to impersonate for the operation
    #[arg(long = "as", global = true)]
    pub impersonate: Option<String>,

    /// Group to impersonate for the operation, can be repeated
    #[arg(long = "as-group", global = true)]
    pub impersonate_groups: Vec<String>,

    /// Similar to --as, but impersonate a service-account. Must be qualified <namespace>:<sa-name> or be combined with --namespace
    #[arg(long = "sa", global = true)]
    pub service_account: Option<String>,

    /// The name of the kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// The name of the kubeconfig cluster to use
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// The name of the kubeconfig user to use
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Path to the kubeconfig file to use
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Also check access for subresources such as pods/log
    #[arg(long, global = true)]
    pub include_subresources: bool,
}

impl Options {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Requested verbs with the wildcard expanded to every valid verb.
    pub fn expanded_verbs(&self) -> Vec<String> {
        if self.verbs.iter().any(|v| v == ALL || v == ALL_ALIAS) {
            constants::VALID_VERBS.iter().map(|v| v.to_string()).collect()
        } else {
            self.verbs.clone()
        }
    }

    pub fn output_format(&self) -> Result<OutputFormat, Error> {
        self.output.parse()
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_verbs(&self.expanded_verbs())?;
        self.output_format().map(|_| ())
    }

    pub fn impersonated_user(&self) -> Result<Option<String>, Error> {
        let sa = match self.service_account.as_deref() {
            None | Some("") => return Ok(self.impersonate.clone()),
            Some(sa) => sa,
        };
        if self.impersonate.as_deref().map_or(false, |user| !user.is_empty()) {
            return Err(Error::ConflictingImpersonation);
        }
        let qualified = if sa.contains(':') {
            sa.to_string()
        } else if let Some(ns) = self.namespace() {
            format!("{}:{}", ns, sa)
        } else {
            return Err(Error::UnqualifiedServiceAccount(sa.to_string()));
        };
        Ok(Some(format!("system:serviceaccount:{}", qualified)))
    }

    /// Returns a copy of these options patched with `flag=value` arguments.
    pub fn with_overrides(&self, overrides: &[String]) -> Result<Options, Error> {
        if overrides.is_empty() {
            return Err(Error::NoOverrides);
        }
        let mut patched = self.clone();
        for arg in overrides {
            let (flag, value) = arg
                .split_once('=')
                .ok_or_else(|| Error::MalformedOverride(arg.clone()))?;
            tracing::debug!(flag, value, "Overriding flag");
            let value = value.to_string();
            match flag {
                "namespace" | "n" => patched.namespace = Some(value),
                "as" => patched.impersonate = Some(value),
                "as-group" => patched.impersonate_groups.push(value),
                "sa" => patched.service_account = Some(value),
                "context" => patched.context = Some(value),
                "cluster" => patched.cluster = Some(value),
                "user" => patched.user = Some(value),
                "kubeconfig" => patched.kubeconfig = Some(PathBuf::from(value)),
                other => return Err(Error::UnknownOverride(other.to_string())),
            }
        }
        Ok(patched)
    }

    pub async fn kube_client(&self) -> Result<Client> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            cluster: self.cluster.clone(),
            user: self.user.clone(),
        };
        let mut config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
            None if options.context.is_some()
                || options.cluster.is_some()
                || options.user.is_some() =>
            {
                Config::from_kubeconfig(&options).await?
            }
            None => Config::infer().await?,
        };
        config.auth_info.impersonate = self.impersonated_user()?;
        if !self.impersonate_groups.is_empty() {
            config.auth_info.impersonate_groups = Some(self.impersonate_groups.clone());
        }
        Ok(Client::try_from(config)?)
    }
}

fn validate_verbs(verbs: &[String]) -> Result<(), Error> {
    let valid: BTreeSet<&str> = constants::VALID_VERBS.iter().copied().collect();
    let unexpected = verbs
        .iter()
        .filter(|v| !valid.contains(v.as_str()))
        .cloned()
        .collect::<BTreeSet<String>>();
    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidVerbs(unexpected.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        options: Options,
    }

    fn options(args: &[&str]) -> Options {
        TestCli::parse_from(std::iter::once("test").chain(args.iter().copied())).options
    }

    #[test]
    fn test_default_options() {
        let opts = options(&[]);
        assert_eq!(opts.expanded_verbs(), vec!["list", "create", "update", "delete"]);
        assert_eq!(opts.output_format(), Ok(OutputFormat::IconTable));
        assert_eq!(opts.namespace(), None);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_verbs_wildcard_expands() {
        for wildcard in ["*", "all"] {
            let verbs = format!("get,{}", wildcard);
            let opts = options(&["--verbs", verbs.as_str()]);
            assert_eq!(opts.expanded_verbs(), constants::VALID_VERBS.to_vec());
        }
    }

    #[test]
    fn test_invalid_verbs() {
        let opts = options(&["--verbs", "get,patch,nope,bogus"]);
        assert_eq!(
            opts.validate(),
            Err(Error::InvalidVerbs(vec!["bogus".into(), "nope".into()]))
        );
    }

    #[test]
    fn test_invalid_output_format() {
        let opts = options(&["-o", "json"]);
        assert_eq!(
            opts.validate(),
            Err(Error::InvalidOutputFormat("json".into()))
        );
        assert_eq!(
            options(&["-o", "ascii-table"]).output_format(),
            Ok(OutputFormat::AsciiTable)
        );
    }

    #[test]
    fn test_empty_namespace_is_cluster_scope() {
        assert_eq!(options(&["-n", ""]).namespace(), None);
        assert_eq!(options(&["-n", "default"]).namespace(), Some("default"));
    }

    #[test]
    fn test_service_account_impersonation() {
        assert_eq!(
            options(&["--sa", "kube-system:coredns"]).impersonated_user(),
            Ok(Some("system:serviceaccount:kube-system:coredns".into()))
        );
        assert_eq!(
            options(&["--sa", "coredns", "-n", "kube-system"]).impersonated_user(),
            Ok(Some("system:serviceaccount:kube-system:coredns".into()))
        );
        assert_eq!(
            options(&["--sa", "coredns"]).impersonated_user(),
            Err(Error::UnqualifiedServiceAccount("coredns".into()))
        );
        assert_eq!(
            options(&["--sa", "ns:coredns", "--as", "alice"]).impersonated_user(),
            Err(Error::ConflictingImpersonation)
        );
        assert_eq!(
            options(&["--as", "alice"]).impersonated_user(),
            Ok(Some("alice".into()))
        );
    }

    #[test]
    fn test_with_overrides() {
        let opts = options(&["-n", "kube-system", "--sa", "coredns"]);
        let patched = opts
            .with_overrides(&["sa=attachdetach-controller".into(), "context=two".into()])
            .unwrap();
        assert_eq!(patched.service_account.as_deref(), Some("attachdetach-controller"));
        assert_eq!(patched.context.as_deref(), Some("two"));
        assert_eq!(patched.namespace(), Some("kube-system"));
        assert_eq!(opts.service_account.as_deref(), Some("coredns"));
    }

    #[test]
    fn test_with_invalid_overrides() {
        let opts = options(&[]);
        assert_eq!(opts.with_overrides(&[]).unwrap_err(), Error::NoOverrides);
        assert_eq!(
            opts.with_overrides(&["context".into()]).unwrap_err(),
            Error::MalformedOverride("context".into())
        );
        assert_eq!(
            opts.with_overrides(&["verbs=get".into()]).unwrap_err(),
            Error::UnknownOverride("verbs".into())
        );
    }
}
