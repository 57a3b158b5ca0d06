pub mod error;
pub mod grid;
pub mod locks;
pub mod mask;
pub mod scheduler;
pub mod viewport;

pub use error::Error;
pub use grid::{GridConfig, Offset, TileCoord};
pub use locks::{lock_key, parse_lock_key, LockBackend, LockRecord, MemoryLockBackend, TileLockStore};
pub use mask::{mask_cache_key, TileMask, MASK_DARK_THRESHOLD, MASK_USABLE};
pub use scheduler::{AdaptiveMargin, FrameRate, RenderScheduler, RenderWindow};
pub use viewport::{Interaction, Selection, ViewState, Viewport};
