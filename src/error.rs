use crate::status::{describe, Status};
use thiserror::Error;

/// Failure of a locator operation.
///
/// `Recoverable` means the cache or lock state is still meaningful and the
/// caller may retry, possibly after refreshing its view of the chunkservers.
/// `Unrecoverable` means the premise of the attempt is gone (the file does not
/// exist, or the write session was torn down) and the caller must give up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("{}: {} (status {})", .context, describe(*.status), .status)]
    Recoverable {
        context: &'static str,
        status: Status,
    },
    #[error("{}: {} (status {})", .context, describe(*.status), .status)]
    Unrecoverable {
        context: &'static str,
        status: Status,
    },
}

impl LocatorError {
    pub fn status(&self) -> Status {
        match self {
            LocatorError::Recoverable { status, .. } | LocatorError::Unrecoverable { status, .. } => {
                *status
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, LocatorError::Recoverable { .. })
    }
}

pub type Result<T> = std::result::Result<T, LocatorError>;

#[cfg(test)]
mod test {
    use super::LocatorError;
    use crate::status::{ERROR_ENOENT, ERROR_LOCKED};

    #[test]
    fn display() {
        let err = LocatorError::Unrecoverable {
            context: "Chunk locator: error sent by master server",
            status: ERROR_ENOENT,
        };
        assert_eq!(
            err.to_string(),
            "Chunk locator: error sent by master server: No such file or directory (status 3)"
        );
        assert!(!err.is_recoverable());
        assert_eq!(err.status(), ERROR_ENOENT);

        let err = LocatorError::Recoverable {
            context: "error sent by master server",
            status: ERROR_LOCKED,
        };
        assert!(err.is_recoverable());
        assert_eq!(err.status(), ERROR_LOCKED);
    }
}
