pub use crate::builder::{AnyCache, CacheBuilder, CachePolicy};
pub use crate::cache::{FifoCache, LfuCache, LruCache, NoOpCache, PolicyCache, TimedCache};
pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use crate::entry::CacheEntry;
pub use crate::error::{ConfigError, ScheduleError};
pub use crate::listener::{CacheListener, RemovalCause};
pub use crate::metrics::{CacheMetricsSnapshot, MetricsSnapshotProvider};
pub use crate::policy::{EvictionPolicy, PolicyKind};
pub use crate::scheduler::{ManualScheduler, PruneScheduler, ScheduleHandle, Scheduler};
pub use crate::simple::SimpleCache;
pub use crate::store::{ReferenceMode, ReferenceStore};
pub use crate::traits::Cache;
pub use crate::weak::WeakCache;
