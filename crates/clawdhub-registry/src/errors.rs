use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} has been deleted")]
    Gone(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported file type: {path}")]
    UnsupportedFileType { path: String },

    #[error("Bundle too large: {size} bytes exceeds the {limit} byte limit")]
    BundleTooLarge { size: u64, limit: u64 },

    #[error("Bundle must contain exactly one SKILL.md file")]
    MissingSkillMd,

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Version {version} already exists for skill '{slug}'")]
    VersionExists { slug: String, version: String },

    #[error("Embedding failed: {0}")]
    EmbeddingUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
