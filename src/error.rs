use std::error::Error;
use std::fmt;

/// Failure of a pattern processing call. No partial result is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Malformed input: empty buffer, zero block size, zero cluster count,
    /// empty palette.
    InvalidArgument(String),
    /// Clustering hit its scan cap before a full scan left every pixel in place.
    ConvergenceRisk { scans: usize },
    Decode(String),
    Encode(String),
    Io(String),
}

impl PatternError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "Invalid argument: {}", message),
            Self::ConvergenceRisk { scans } => write!(
                f,
                "Clustering did not converge after {} scans; raise or remove the scan cap",
                scans
            ),
            Self::Decode(message) => write!(f, "Failed to decode image: {}", message),
            Self::Encode(message) => write!(f, "Failed to encode image: {}", message),
            Self::Io(message) => write!(f, "Failed to read file: {}", message),
        }
    }
}

impl Error for PatternError {}
