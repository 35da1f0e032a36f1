use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected verbs: {0:?}")]
    InvalidVerbs(Vec<String>),

    #[error("unexpected output format: {0}")]
    InvalidOutputFormat(String),

    #[error("--sa cannot be mixed with --as")]
    ConflictingImpersonation,

    #[error("serviceAccounts are namespaced, either provide --namespace or fully qualify the serviceAccount: '<namespace>:{0}'")]
    UnqualifiedServiceAccount(String),

    #[error("diff arg needs to set a value (example flag=value), got {0}")]
    MalformedOverride(String),

    #[error("flag {0} cannot be overridden")]
    UnknownOverride(String),

    #[error("nothing to diff against, pass at least one flag=value override")]
    NoOverrides,

    #[error("unexpected GroupVersion string: {0}")]
    InvalidGroupVersion(String),

    #[error("the server doesn't have a resource type \"{0}\"")]
    UnknownResource(String),
}
