//! Tool error type and the outcome rendering used at the model boundary.
//!
//! Internally tools return structured errors; the model only ever sees a
//! flat text reply, so both success and failure are folded into strings
//! before they leave the toolbox.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// The model supplied arguments the tool cannot use.
    #[error("{0}")]
    InvalidArguments(String),

    /// Service-account credentials could not be loaded or exchanged.
    #[error("{0}")]
    Auth(String),

    /// A Google API call failed or returned an error status.
    #[error("{0}")]
    Api(String),

    /// The headless browser failed to launch, navigate, or evaluate.
    #[error("{0}")]
    Browser(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Stable label used for metrics and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::Auth(_) => "auth",
            ToolError::Api(_) => "api",
            ToolError::Browser(_) => "browser",
            ToolError::Io(_) => "io",
        }
    }
}

/// Render a tool outcome as the text sent back to the model.
///
/// Successes pass through unchanged. Failures use a fixed phrasing that
/// tells the model to stop retrying and summarise the exception instead.
pub fn render_outcome(outcome: Result<String, ToolError>) -> String {
    match outcome {
        Ok(reply) => reply,
        Err(e) => format!(
            "An exception occurred while using the tool!\nHere it is. {e}\n\n\
             Stop here and respond with the exception summary."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_passes_through() {
        let reply = render_outcome(Ok("done".to_string()));
        assert_eq!(reply, "done");
    }

    #[test]
    fn test_failure_phrasing() {
        let reply = render_outcome(Err(ToolError::Api("quota exceeded".to_string())));
        assert!(reply.starts_with("An exception occurred while using the tool!\nHere it is. "));
        assert!(reply.contains("quota exceeded"));
        assert!(reply.ends_with("Stop here and respond with the exception summary."));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ToolError::InvalidArguments(String::new()).kind(), "invalid_arguments");
        assert_eq!(ToolError::Auth(String::new()).kind(), "auth");
        assert_eq!(ToolError::Api(String::new()).kind(), "api");
        assert_eq!(ToolError::Browser(String::new()).kind(), "browser");
        let io = ToolError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(io.kind(), "io");
    }
}
