use core::fmt;

/// Result alias for `svmerge`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the merging engine and its support modules.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Matrix or sample dimension mismatch.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// A configuration call was invalid for the current strategy or carried
    /// an out-of-range parameter. Prior configuration is left unchanged.
    InvalidConfiguration {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// `calibrate` or `cluster` was called before `set_initial_state`.
    Uninitialized,

    /// A threshold or sweep bound fell outside its valid range.
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },

    /// The mixture fit or regression could not produce usable parameters.
    DegenerateMixture(String),

    /// Generic error with message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidConfiguration { name, message } => {
                write!(f, "invalid configuration '{name}': {message}")
            }
            Error::Uninitialized => {
                write!(f, "no initial state: call set_initial_state first")
            }
            Error::OutOfRange { name, value } => {
                write!(f, "parameter '{name}' out of range: {value}")
            }
            Error::DegenerateMixture(msg) => write!(f, "degenerate mixture: {msg}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
