use std::path::PathBuf;

/// Errors that can occur while scanning a pull request.
///
/// Library crates return this type directly; the binary reports it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use iacscan_core::IacScanError;
///
/// let err = IacScanError::Config("missing API token".into());
/// assert!(err.to_string().contains("missing API token"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum IacScanError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("settings come from flags, environment variables, or .iacscan.toml"))]
    Config(String),

    /// Source hosting (GitHub) request failure.
    #[error("source host error: {0}")]
    Host(String),

    /// Scanning service request or response failure.
    #[error("scan API error: {0}")]
    Api(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: IacScanError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = IacScanError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn api_error_displays_message() {
        let err = IacScanError::Api("upload rejected".into());
        assert_eq!(err.to_string(), "scan API error: upload rejected");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = IacScanError::FileNotFound(PathBuf::from("/tmp/.iacscan.toml"));
        assert!(err.to_string().contains("/tmp/.iacscan.toml"));
    }
}
