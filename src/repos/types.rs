use failure::Error as FailureError;

/// Repos layer Result
pub type RepoResult<T> = Result<T, FailureError>;
