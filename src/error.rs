use std::{error::Error, fmt, io};

/// Classifies why a feature specification was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecErrorKind {
    /// The document could not be read or is malformed.
    Parse,
    /// The feature spec names a column that the analysis schema does not know.
    UnknownColumn,
    MissingTarget,
    DuplicateTarget,
    MissingKey,
    DuplicateKey,
    /// A transform parameter or default has the wrong type or is out of range,
    /// or the transform does not fit the column's role.
    BadParameter,
}

impl fmt::Display for SpecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parse => "parse",
            Self::UnknownColumn => "unknown column",
            Self::MissingTarget => "missing target",
            Self::DuplicateTarget => "duplicate target",
            Self::MissingKey => "missing key",
            Self::DuplicateKey => "duplicate key",
            Self::BadParameter => "bad parameter",
        };
        f.write_str(s)
    }
}

/// A rejected feature specification.
#[derive(Debug)]
pub struct SpecError {
    kind: SpecErrorKind,
    column: Option<String>,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl SpecError {
    pub fn new<M: Into<String>>(kind: SpecErrorKind, msg: M) -> Self {
        Self {
            kind,
            column: None,
            msg: msg.into(),
            source: None,
        }
    }

    /// Attaches the offending column name.
    pub fn with_column<C: Into<String>>(mut self, column: C) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_source<E: Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn parse<M: Into<String>>(msg: M) -> Self {
        Self::new(SpecErrorKind::Parse, msg)
    }

    pub fn bad_parameter<C: Into<String>, M: Into<String>>(column: C, msg: M) -> Self {
        Self::new(SpecErrorKind::BadParameter, msg).with_column(column)
    }

    pub fn kind(&self) -> SpecErrorKind {
        self.kind
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{} ({column}): {}", self.kind, self.msg),
            None => write!(f, "{}: {}", self.kind, self.msg),
        }
    }
}

impl Error for SpecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// All errors that can occur while preparing or running a training job.
#[derive(Debug)]
pub enum TrainError {
    /// Invalid training configuration, caught before submission.
    InvalidConfig(String),
    /// The feature specification failed validation.
    Spec(SpecError),
    /// The analysis output could not be interpreted.
    Schema(String),
    /// The executor failed to accept or run the job.
    Job(String),
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Spec(e) => write!(f, "invalid feature spec: {e}"),
            Self::Schema(msg) => write!(f, "invalid analysis schema: {msg}"),
            Self::Job(msg) => write!(f, "job error: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spec(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<SpecError> for TrainError {
    fn from(e: SpecError) -> Self {
        Self::Spec(e)
    }
}
