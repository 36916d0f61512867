pub mod engine;
pub mod record;
pub mod seen;
pub mod writer;

pub use engine::{CrawlEngine, CrawlResult, EngineConfig};
pub use record::RepositoryRecord;
pub use seen::SeenSet;
pub use writer::{Writer, WriterMessage};
