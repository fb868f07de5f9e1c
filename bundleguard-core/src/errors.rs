//! Error types for BundleGuard

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Coarse classification of a [`GuardError`].
///
/// None of these are retried by the engine; the only recovery available to a
/// user is re-running with adjusted configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Collision,
    Exhaustion,
    Integrity,
    Io,
}

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid pattern `{rule}`: {reason}")]
    InvalidPattern { rule: String, reason: String },

    #[error("Duplicate target name: {raw} -> {target} (already used by {existing})")]
    DuplicateTargetName {
        raw: String,
        target: String,
        existing: String,
    },

    #[error("Duplicate obfuscated path: {raw} -> {target} (already used by {existing})")]
    DuplicatePath {
        raw: String,
        target: String,
        existing: String,
    },

    #[error("Package id {id:#04x} already in use (package `{name}`)")]
    DuplicatePackageId { id: u32, name: String },

    #[error("Name pool exhausted for {scope}: at most {limit} names can be obfuscated in a single scope")]
    Exhausted { scope: String, limit: usize },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Malformed mapping file at line {line}: {reason}")]
    MalformedMapping { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signing error: {0}")]
    Signing(String),
}

impl GuardError {
    /// Coarse category of the error, for reporting and exit codes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::Configuration(_)
            | GuardError::InvalidPattern { .. }
            | GuardError::MalformedMapping { .. } => ErrorKind::Configuration,
            GuardError::DuplicateTargetName { .. }
            | GuardError::DuplicatePath { .. }
            | GuardError::DuplicatePackageId { .. } => ErrorKind::Collision,
            GuardError::Exhausted { .. } => ErrorKind::Exhaustion,
            GuardError::Integrity(_) | GuardError::Serialization(_) => ErrorKind::Integrity,
            GuardError::Io(_) | GuardError::Archive(_) | GuardError::Signing(_) => ErrorKind::Io,
        }
    }
}

impl From<tempfile::PersistError> for GuardError {
    fn from(err: tempfile::PersistError) -> Self {
        GuardError::Io(err.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_variants_share_a_kind() {
        let err = GuardError::DuplicateTargetName {
            raw: "com.app.R.drawable.b".into(),
            target: "com.app.R.drawable.a".into(),
            existing: "com.app.R.drawable.c".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Collision);
        assert!(err.to_string().contains("com.app.R.drawable.a"));

        let err = GuardError::DuplicatePackageId {
            id: 0x7f,
            name: "com.app".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Collision);
        assert!(err.to_string().contains("0x7f"));
    }

    #[test]
    fn test_io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "fail");
        let err: GuardError = io_err.into();
        assert!(matches!(err, GuardError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
