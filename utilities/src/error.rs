use std::error::Error;
use std::fmt::Display;

/// Errors shared by the master, the chunk servers and the client.
///
/// Request-level variants render with an `Error` prefix because they travel
/// in-band on the same connection as regular responses and callers match on
/// that prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GfsError {
    Config(String),
    Connection(String),
    NoServerAvailable(String),
    FileNotFound(String),
    LocalWrite(String),
    Replication(String),
    Protocol(String),
}

impl GfsError {
    /// Parses an in-band error string sent back by the master or a chunk
    /// server. Returns `None` when the payload is not an error message.
    pub fn from_response(response: &str) -> Option<Self> {
        if !response.contains("Error") {
            return None;
        }
        let message = response.trim().to_owned();
        if message.contains("not found") {
            Some(GfsError::FileNotFound(message))
        } else if message.contains("No server available") {
            Some(GfsError::NoServerAvailable(message))
        } else {
            Some(GfsError::Protocol(message))
        }
    }
    pub fn is_connection(&self) -> bool {
        matches!(self, GfsError::Connection(_))
    }
}

impl Display for GfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GfsError::Config(msg) => write!(f, "Error: invalid configuration : {}", msg),
            GfsError::Connection(msg) => write!(f, "Error: connection failure : {}", msg),
            GfsError::NoServerAvailable(file_name) => {
                write!(f, "Error: No server available for file {}", file_name)
            }
            GfsError::FileNotFound(file_name) => write!(f, "Error: File {} not found", file_name),
            GfsError::LocalWrite(msg) => write!(f, "Error: local write failed : {}", msg),
            GfsError::Replication(msg) => write!(f, "Error: replication failed : {}", msg),
            GfsError::Protocol(msg) => write!(f, "Error: malformed message : {}", msg),
        }
    }
}

impl Error for GfsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_level_errors_are_prefixed() {
        let not_found = GfsError::FileNotFound("report.txt".to_owned());
        assert!(not_found.to_string().starts_with("Error"));
        let unavailable = GfsError::NoServerAvailable("report.txt".to_owned());
        assert!(unavailable.to_string().starts_with("Error"));
    }

    #[test]
    fn parses_in_band_errors() {
        let rendered = GfsError::FileNotFound("a.txt".to_owned()).to_string();
        assert!(matches!(
            GfsError::from_response(&rendered),
            Some(GfsError::FileNotFound(_))
        ));
        let rendered = GfsError::NoServerAvailable("a.txt".to_owned()).to_string();
        assert!(matches!(
            GfsError::from_response(&rendered),
            Some(GfsError::NoServerAvailable(_))
        ));
        assert_eq!(GfsError::from_response("127.0.0.1:6001"), None);
    }
}
