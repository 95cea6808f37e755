use std::time::Duration;

/// Failure classes for talking to Twitch.
///
/// `Auth` means the upstream no longer accepts our credential (or a refresh
/// exchange failed) and a plain retry is pointless. `Upstream` carries the
/// status so callers can tell transient conditions from hard rejections.
#[derive(Debug, thiserror::Error)]
pub enum HelixError {
    #[error("authorization rejected: {0}")]
    Auth(String),

    #[error("twitch returned {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl HelixError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(..) => false,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
        }
    }

    /// The cooldown hint from a rate-limit response, if one was given.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Upstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
