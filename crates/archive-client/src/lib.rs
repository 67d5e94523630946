//! Archive access for weather-extract: resource location, transport,
//! and the retry/backoff wrapper around unreliable remote fetches.

pub mod descriptor;
pub mod error;
pub mod locator;
pub mod notify;
pub mod retry;
pub mod transport;

pub use descriptor::ResourceDescriptor;
pub use error::FetchError;
pub use locator::{ArchiveCatalog, ModelArchiveConfig, NamingConvention, ResourceLocator};
pub use notify::{LogNotifier, Notification, Notifier};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use transport::{ArchiveAccess, HttpArchive};
