use thiserror::Error;

#[derive(Debug, Error)]
pub enum DarkIvError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("insufficient range: {0}")]
    InsufficientRange(String),

    #[error("degenerate fit: {0}")]
    DegenerateFit(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copyable reason code for an error, carried by unavailable parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientData,
    InsufficientRange,
    DegenerateFit,
    DependencyUnavailable,
    Schema,
    Config,
    Parse,
    UnsupportedFormat,
    Io,
}

impl DarkIvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DarkIvError::InsufficientData(_) => ErrorKind::InsufficientData,
            DarkIvError::InsufficientRange(_) => ErrorKind::InsufficientRange,
            DarkIvError::DegenerateFit(_) => ErrorKind::DegenerateFit,
            DarkIvError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            DarkIvError::Schema(_) => ErrorKind::Schema,
            DarkIvError::Config(_) => ErrorKind::Config,
            DarkIvError::Parse(_) => ErrorKind::Parse,
            DarkIvError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            DarkIvError::Io(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::InsufficientRange => "insufficient_range",
            ErrorKind::DegenerateFit => "degenerate_fit",
            ErrorKind::DependencyUnavailable => "dependency_unavailable",
            ErrorKind::Schema => "schema",
            ErrorKind::Config => "config",
            ErrorKind::Parse => "parse",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, DarkIvError>;
