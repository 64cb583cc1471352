use thiserror::Error;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    /// Used when the user pass a logical invalid parameter to a function.
    #[error("Parameter error: {0}")]
    InvalidParameter(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parser error: {0}")]
    Parser(String),
    /// The mesh generator produced vertices without normals.
    #[error("Mesh has {0} vertices but no normals")]
    MissingNormals(usize),
    /// A per-vertex attribute array is shorter than the vertex array.
    #[error("Mesh attribute `{attribute}` has {found} entries, expected {expected}")]
    AttributeMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },
    /// Error reported by a mesh generator implementation.
    #[error("Mesh generation failed: {0}")]
    MeshGeneration(String),
}

impl Error {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        Error::InvalidParameter(msg.to_string())
    }
}

/// Fails with `AttributeMismatch` unless a per-vertex attribute has exactly
/// `expected` entries.
pub(crate) fn check_attribute_len(
    attribute: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), Error> {
    if found != expected {
        Err(Error::AttributeMismatch {
            attribute,
            expected,
            found,
        })
    } else {
        Ok(())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parser(err.to_string())
    }
}
