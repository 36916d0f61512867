use std::fmt;
use std::time::Duration;

/// Transient conditions the transport retries internally. Never
/// escapes the transport: exhausting `max_retries` converts the last
/// observed cause into a `TransportFatal`.
#[derive(Debug, Clone)]
pub enum RetryableCause {
    Network(String),
    Transient5xx(u16),
    SecondaryRateLimit(Duration),
    GraphQLRetry(Option<Duration>),
}

impl fmt::Display for RetryableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Transient5xx(status) => write!(f, "transient status {status}"),
            Self::SecondaryRateLimit(wait) => {
                write!(f, "secondary rate limit, retry after {wait:?}")
            }
            Self::GraphQLRetry(wait) => write!(f, "retryable graphql error, retry after {wait:?}"),
        }
    }
}

/// Non-retryable outcome of a GraphQL call; the only error kind that
/// leaves the transport.
#[derive(Debug, Clone)]
pub enum FatalCause {
    Http4xx { status: u16, body: String },
    GraphQLError { errors: Vec<String> },
    MissingData,
    RetriesExhausted { last_retryable: String },
}

impl fmt::Display for FatalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http4xx { status, body } => write!(f, "http {status}: {body}"),
            Self::GraphQLError { errors } => write!(f, "graphql errors: {}", errors.join("; ")),
            Self::MissingData => write!(f, "response missing data field"),
            Self::RetriesExhausted { last_retryable } => {
                write!(f, "retries exhausted, last cause: {last_retryable}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("graphql transport failed: {cause}")]
pub struct TransportFatal {
    pub cause: FatalCause,
}

impl TransportFatal {
    pub fn new(cause: FatalCause) -> Self {
        Self { cause }
    }
}

pub(crate) enum Outcome {
    Retry(RetryableCause),
    Fatal(FatalCause),
}
