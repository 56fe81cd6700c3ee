use thiserror::Error;

/// User-reportable failure taxonomy.
///
/// Every variant maps to a distinct class of chat reply at the command
/// dispatch boundary.  None of these represent bugs or I/O faults; those
/// surface through [`EmissaryError::Internal`] and are logged rather than
/// explained to the user.
#[derive(Error, Debug)]
pub enum EmissaryError {
    /// The requested entity, grant, or record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Creation of an identity or named entity that already exists under
    /// the applicable uniqueness rule.
    #[error("{0}")]
    DuplicateEntity(String),

    /// The actor lacks ownership and lacks a satisfying permission grant.
    #[error("You don't have permission to do that.")]
    PermissionDenied,

    /// Structural misuse, e.g. checking guild-scoped permissions outside a
    /// guild, or registering a bot account as a user.
    #[error("{0}")]
    UnmetPrecondition(String),

    /// Input failed a business rule (reserved name, invalid characters...).
    #[error("{0}")]
    Validation(String),

    /// Unexpected failure (storage faults and the like).  Reported to the
    /// user as a generic internal error, details go to the log only.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EmissaryError {
    /// Whether this error should be rendered verbatim to the user.
    ///
    /// `Internal` errors get a generic message instead; the real cause is
    /// only visible in the logs.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, EmissaryError::Internal(_))
    }
}

/// Convenience alias used by the service layer.
pub type Result<T> = std::result::Result<T, EmissaryError>;
