//! Audio caching: content-addressed file store, durable SQLite index,
//! optional in-process fast tier and the coordinator tying them together.

pub mod audio_store;
pub mod coordinator;
pub mod fast;
pub mod index;

pub use audio_store::{
    AudioStore, AudioStoreError, StoredAudio, audio_url, content_type_for, sanitize_filename,
};
pub use coordinator::{
    CacheCoordinator, CacheSource, CoordinatorOptions, CoordinatorStats, Resolved,
};
pub use fast::{CacheError, FastCache, MokaFastCache, NoopFastCache, SharedFastCache};
pub use index::{CacheEntry, CacheIndex, IndexError, IndexStats};
