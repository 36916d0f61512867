pub mod backoff;
pub mod error;
pub mod model;
pub mod queries;
pub mod rate_limiter;
pub mod transport;

pub use error::{FatalCause, RetryableCause, TransportFatal};
pub use model::{parse_rate_limit, parse_retry_after, RateLimitSnapshot};
pub use queries::{REPOSITORY_COUNT_QUERY, REPOSITORY_SEARCH_QUERY};
pub use rate_limiter::RateCoordinator;
pub use transport::{GraphqlClient, TransportConfig};
