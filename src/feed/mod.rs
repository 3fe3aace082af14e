//! Live feed: message model, ingestion, transport, and the view seam.

pub mod ingest;
pub mod transport;
pub mod types;
pub mod view;

pub use ingest::Ingestor;
pub use transport::TransportConfig;
pub use view::{FeedView, LogView};
