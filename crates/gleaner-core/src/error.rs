use thiserror::Error;

/// Fatal, run-level failures. Per-document failures never appear here; they
/// are rows in the output artifact.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Provisioning(#[from] crate::provision::ProvisioningError),

    #[error(transparent)]
    Discovery(#[from] crate::document::DiscoveryError),

    #[error(transparent)]
    Service(#[from] crate::service::ServiceError),

    #[error(transparent)]
    Export(#[from] crate::aggregate::ExportError),
}

pub type Result<T> = std::result::Result<T, Error>;
