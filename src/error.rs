//! Error types for PAC configuration and evaluation.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the PAC engine.
///
/// Only configuration paths hand these to callers. Routing queries swallow
/// them and fall back to `DIRECT`.
#[derive(Debug, Error)]
pub enum PacError {
    /// The script body is not valid JavaScript.
    #[error("PAC script failed to compile: {0}")]
    ScriptCompile(String),

    /// Nothing to compile.
    #[error("PAC script is empty")]
    EmptyScript,

    /// `FindProxyForURL` ran past its time or iteration budget.
    #[error("PAC evaluation exceeded its budget of {0:?}")]
    ScriptTimeout(Duration),

    /// The script threw, or `FindProxyForURL` could not be called.
    #[error("PAC evaluation failed: {0}")]
    Evaluation(String),

    /// The script source could not be fetched.
    #[error("failed to fetch PAC script from {url}: {reason}")]
    Fetch {
        /// Location that was requested.
        url: String,
        /// Why the fetch produced nothing.
        reason: String,
    },

    /// A routing URL without a usable host.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl PacError {
    pub(crate) fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_names_url() {
        let err = PacError::fetch("http://wpad/wpad.dat", "connection refused");
        let text = err.to_string();
        assert!(text.contains("http://wpad/wpad.dat"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn timeout_reports_budget() {
        let err = PacError::ScriptTimeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "PAC evaluation exceeded its budget of 250ms");
    }
}
