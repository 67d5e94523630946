//! On-disk staging for weather-extract: the raw native store, the
//! domain-clipped subgrid cache, and field resolution against archive
//! artifacts.

pub mod artifact;
pub mod clip;
pub mod jsonfmt;
pub mod native_store;
pub mod resolver;
pub mod subgrid_cache;

pub use artifact::{DatasetFormat, EntryReader, RawArtifact, RawField};
pub use jsonfmt::JsonDatasetFormat;
pub use native_store::NativeStore;
pub use resolver::resolve_field;
pub use subgrid_cache::{CacheStats, SubgridCache};
