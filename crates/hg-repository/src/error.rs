use std::path::PathBuf;

use hg_revlog::RevlogError;
use hg_types::TypesError;
use hg_utils::UtilError;

/// Errors produced by repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("no repository found in '{0}' or any parent directory")]
    NotFound(PathBuf),

    #[error("repository requires unsupported feature '{0}'")]
    UnsupportedRequirement(String),

    #[error("repository already exists at '{0}'")]
    AlreadyExists(PathBuf),

    #[error(transparent)]
    Revlog(#[from] RevlogError),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Lock(#[from] UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
