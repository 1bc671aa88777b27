use std::error;
use std::fmt;

/// Convenient result type for duplication operations using [`DupError`] as the error type.
pub type DupResult<T> = Result<T, DupError>;

/// Main error type of the duplication metadata service.
///
/// A [`DupError`] is either a single error with a kind and a static description, optionally
/// enriched with a dynamic detail, or a list of aggregated errors.
#[derive(Debug, Clone)]
pub struct DupError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    Many(Vec<DupError>),
}

/// Categories of errors raised by the duplication state machine and its collaborators.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Status & Workflow Errors
    InvalidTransition,

    // Registry Errors
    DuplicationNotFound,
    DuplicationAlreadyExists,
    AppNotAvailable,

    // Metadata Store Errors
    PersistenceFailure,

    // Encoding Errors
    DecodeFailure,
    InvalidData,

    // Worker Errors
    PersistenceWorkerPanic,

    // Configuration & IO Errors
    ConfigError,
    IoError,

    // Unknown / Uncategorized
    Unknown,

    // Special error kind used by tests that inject failures through failpoints.
    #[cfg(feature = "failpoints")]
    FailpointTriggered,
}

impl DupError {
    /// Creates a [`DupError`] containing multiple aggregated errors.
    pub fn many(errors: Vec<DupError>) -> DupError {
        DupError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detail of this error, or of the first aggregated error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|e| e.detail()),
            _ => None,
        }
    }
}

impl PartialEq for DupError {
    fn eq(&self, other: &DupError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for DupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")
                } else if errors.len() == 1 {
                    errors[0].fmt(f)
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

impl error::Error for DupError {}

impl From<(ErrorKind, &'static str)> for DupError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> DupError {
        DupError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for DupError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> DupError {
        DupError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl<E> From<Vec<E>> for DupError
where
    E: Into<DupError>,
{
    fn from(errors: Vec<E>) -> DupError {
        DupError {
            repr: ErrorRepr::Many(errors.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<std::io::Error> for DupError {
    fn from(err: std::io::Error) -> DupError {
        DupError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`serde_json::Error`] to [`DupError`].
///
/// Syntax, data and EOF errors can only come out of decoding a persisted blob and map to
/// [`ErrorKind::DecodeFailure`].
impl From<serde_json::Error> for DupError {
    fn from(err: serde_json::Error) -> DupError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::DecodeFailure, "JSON deserialization failed")
            }
        };

        DupError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

impl From<std::str::Utf8Error> for DupError {
    fn from(err: std::str::Utf8Error) -> DupError {
        DupError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::DecodeFailure,
                "UTF-8 conversion failed",
                err.to_string(),
            ),
        }
    }
}

impl From<std::num::ParseIntError> for DupError {
    fn from(err: std::num::ParseIntError) -> DupError {
        DupError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::DecodeFailure,
                "Integer parsing failed",
                err.to_string(),
            ),
        }
    }
}

impl From<dup_config::shared::ValidationError> for DupError {
    fn from(err: dup_config::shared::ValidationError) -> DupError {
        DupError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConfigError,
                "Invalid duplication configuration",
                err.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dup_error;

    #[test]
    fn test_simple_error_creation() {
        let err = DupError::from((ErrorKind::InvalidTransition, "Status change rejected"));
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(err.detail(), None);
        assert_eq!(err.kinds(), vec![ErrorKind::InvalidTransition]);
    }

    #[test]
    fn test_error_with_detail() {
        let err = dup_error!(
            ErrorKind::PersistenceFailure,
            "Write failed",
            "meta store unavailable"
        );
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert_eq!(err.detail(), Some("meta store unavailable"));
    }

    #[test]
    fn test_multiple_errors() {
        let err = DupError::many(vec![
            dup_error!(ErrorKind::DecodeFailure, "Bad blob"),
            dup_error!(ErrorKind::PersistenceFailure, "Write failed", "timeout"),
        ]);

        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::DecodeFailure, ErrorKind::PersistenceFailure]
        );
        assert_eq!(err.detail(), Some("timeout"));
        assert!(err.to_string().contains("Multiple errors occurred (2 total)"));
    }

    #[test]
    fn test_empty_multiple_errors() {
        let err = DupError::many(vec![]);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.kinds().is_empty());
    }

    #[test]
    fn test_json_syntax_error_is_decode_failure() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        let err: DupError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_json_io_error_is_io_error() {
        struct FailingReader;

        impl std::io::Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("connection reset"))
            }
        }

        let json_err = serde_json::from_reader::<_, serde_json::Value>(FailingReader).unwrap_err();
        let err: DupError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_error_display() {
        let err = dup_error!(ErrorKind::InvalidTransition, "Status change rejected");
        assert_eq!(err.to_string(), "InvalidTransition: Status change rejected");

        let err = dup_error!(ErrorKind::DuplicationNotFound, "Unknown duplication", "d42");
        assert_eq!(
            err.to_string(),
            "DuplicationNotFound: Unknown duplication -> d42"
        );
    }
}
