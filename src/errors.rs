/// Error taxonomy for elevation gain estimation.
///
/// Everything here is raised before the smoother or climb tracker run:
/// once a trace and a configuration are accepted the computation itself
/// cannot fail.

#[derive(Debug, thiserror::Error)]
pub enum GainError {
    /// Trace rejected before computation (empty, non-finite, out of order).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration rejected at build time (window or threshold out of range).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Track, reference or config file could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported track format: {0}")]
    UnsupportedFormat(String),
}

impl GainError {
    /// True for errors that mean "no estimate available" for an activity
    /// rather than a broken setup.
    pub fn is_activity_error(&self) -> bool {
        matches!(
            self,
            GainError::InvalidInput(_) | GainError::Parse(_) | GainError::UnsupportedFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GainError::InvalidConfiguration("smoothing window must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: smoothing window must be positive"
        );

        let io: GainError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(io.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_activity_error_classification() {
        assert!(GainError::InvalidInput("empty".into()).is_activity_error());
        assert!(GainError::Parse("bad xml".into()).is_activity_error());
        assert!(!GainError::InvalidConfiguration("window".into()).is_activity_error());
    }
}
