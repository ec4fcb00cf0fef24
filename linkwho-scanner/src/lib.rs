pub mod cache;
pub mod client;
pub mod editors;
pub mod error;
pub mod introductions;
pub mod paginate;
pub mod revisions;
pub mod usage;
pub mod users;

pub use cache::IntroductionCache;
pub use client::{ApiClient, ClientOptions};
pub use editors::{EditorKey, EditorSet};
pub use error::ScanError;
pub use introductions::Introductions;
pub use paginate::PageQuery;
pub use revisions::{Introduction, Revision, RevisionScanner};
pub use usage::{LinkUsage, LinkUsageCrawler, UsageCallback};
pub use users::{Contribution, EditorMetadata, EditorProfile, MetadataFetcher};
