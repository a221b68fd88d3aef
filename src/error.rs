use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[cfg(feature = "consul")]
    #[error("consul transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("consul {op} failed with status {status}: {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected consul response to {op}: {message}")]
    Protocol { op: &'static str, message: String },

    #[error("service '{0}' is not registered with the local agent")]
    ServiceNotRegistered(String),

    #[error("no role decided after {attempts} election attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("coordination backend error: {0}")]
    Backend(String),
}

impl Error {
    /// True when the election gave up because it ran out of attempts, as
    /// opposed to the coordination service failing.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Error::RetriesExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
