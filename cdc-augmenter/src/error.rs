//! Error types and result definitions for the augmentation pipeline.
//!
//! [`CdcError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, the originating error and the callsite it was raised at. Several
//! errors can be aggregated into one, which is how concurrent task failures surface.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use cdc_mysql::replication::lock::LockError;
use cdc_mysql::replication::schema::SchemaError;

/// Result type used throughout the crate.
pub type CdcResult<T> = Result<T, CdcError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct CdcError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Failures collected from several tasks, e.g. when joining the coordinator.
    Many {
        errors: Vec<CdcError>,
        location: &'static Location<'static>,
    },
}

/// Classification of [`CdcError`]s by functional area.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source database
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceSchemaError,
    SourceError,

    // Schema and data
    MissingTableSchema,
    ConversionError,
    InvalidData,

    // Configuration
    ConfigError,
    ValidationError,

    // IO and serialization
    IoError,
    SerializationError,
    DeserializationError,
    CheckpointError,

    // Coordination
    LeaderElectionFailed,
    LeadershipLost,
    InvalidState,
    ApplyWorkerPanic,
    CoordinatorPanic,

    // Destination
    DestinationError,

    Unknown,
}

impl CdcError {
    /// Returns the [`ErrorKind`], the first one for aggregated errors.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "multiple errors",
        }
    }

    /// Returns the dynamic detail, the first available one for aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error. Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        CdcError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        CdcError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for CdcError {
    fn eq(&self, other: &CdcError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for CdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line()
                )?;

                if let Some(detail) = &payload.detail {
                    for line in detail.lines() {
                        write!(f, "\n  {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} errors aggregated @ {}:{}",
                    errors.len(),
                    location.file(),
                    location.line()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    for (line_index, line) in rendered.lines().enumerate() {
                        if line_index == 0 {
                            write!(f, "\n  {}. {line}", index + 1)?;
                        } else {
                            write!(f, "\n     {line}")?;
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for CdcError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for CdcError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for CdcError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for CdcError
where
    E: Into<CdcError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> CdcError {
        let location = Location::caller();
        let mut errors: Vec<CdcError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        CdcError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for CdcError {
    #[track_caller]
    fn from(err: std::io::Error) -> CdcError {
        CdcError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for CdcError {
    #[track_caller]
    fn from(err: serde_json::Error) -> CdcError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::DeserializationError, "JSON deserialization failed")
            }
        };

        CdcError::wrap(kind, description, err)
    }
}

impl From<std::num::ParseIntError> for CdcError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> CdcError {
        CdcError::wrap(ErrorKind::ConversionError, "Integer parsing failed", err)
    }
}

impl From<regex::Error> for CdcError {
    #[track_caller]
    fn from(err: regex::Error) -> CdcError {
        CdcError::wrap(ErrorKind::ConfigError, "Invalid regular expression", err)
    }
}

impl From<cdc_config::shared::ValidationError> for CdcError {
    #[track_caller]
    fn from(err: cdc_config::shared::ValidationError) -> CdcError {
        CdcError::wrap(ErrorKind::ValidationError, "Invalid configuration", err)
    }
}

/// Maps database errors to [`ErrorKind::SourceQueryFailed`], I/O errors to
/// [`ErrorKind::IoError`] and pool failures to [`ErrorKind::SourceConnectionFailed`].
impl From<sqlx::Error> for CdcError {
    #[track_caller]
    fn from(err: sqlx::Error) -> CdcError {
        let kind = match &err {
            sqlx::Error::Io(_) => ErrorKind::IoError,
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                ErrorKind::SourceConnectionFailed
            }
            _ => ErrorKind::SourceQueryFailed,
        };

        CdcError::wrap(kind, "Database operation failed", err)
    }
}

impl From<SchemaError> for CdcError {
    #[track_caller]
    fn from(err: SchemaError) -> CdcError {
        match err {
            SchemaError::Database(err) => err.into(),
            err @ SchemaError::UnexpectedCreateTable { .. } => CdcError::wrap(
                ErrorKind::SourceSchemaError,
                "Schema introspection returned unexpected data",
                err,
            ),
        }
    }
}

impl From<LockError> for CdcError {
    #[track_caller]
    fn from(err: LockError) -> CdcError {
        match err {
            LockError::Database(err) => err.into(),
            err @ LockError::RequestFailed(_) => CdcError::wrap(
                ErrorKind::LeaderElectionFailed,
                "Leadership lock request failed",
                err,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, cdc_error};

    fn failing() -> CdcResult<()> {
        bail!(ErrorKind::InvalidData, "Row is malformed", "column count 3 != 4");
    }

    #[test]
    fn test_macro_carries_kind_and_detail() {
        let err = failing().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.description(), "Row is malformed");
        assert_eq!(err.detail(), Some("column count 3 != 4"));
        assert!(err.location().file().ends_with("error.rs"));
    }

    #[test]
    fn test_vec_of_one_is_not_wrapped() {
        let err: CdcError = vec![cdc_error!(ErrorKind::IoError, "Disk gone")].into();

        assert_eq!(err.kinds(), vec![ErrorKind::IoError]);
        assert_eq!(err.description(), "Disk gone");
    }

    #[test]
    fn test_aggregated_errors_expose_all_kinds() {
        let err: CdcError = vec![
            cdc_error!(ErrorKind::CheckpointError, "Checkpoint write failed"),
            cdc_error!(ErrorKind::DestinationError, "Sink rejected batch"),
        ]
        .into();

        assert_eq!(err.kind(), ErrorKind::CheckpointError);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::CheckpointError, ErrorKind::DestinationError]
        );
        assert!(err.to_string().contains("2 errors aggregated"));
    }

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CdcError::from(io);

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(error::Error::source(&err).is_some());
    }
}
