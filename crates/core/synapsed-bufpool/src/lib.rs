//! # Synapsed Buffer Pool
//!
//! A fixed-arena buffer pool: hands out reusable byte ranges to many
//! concurrent callers from one growable arena, and reclaims them into
//! size-indexed free lists instead of allocating per request.
//!
//! ## Components
//!
//! - **Size classes** ([`SizeClassifier`]): requests round up to a multiple of
//!   the block size
//! - **Arena** ([`BackingArena`]): one growable region with a monotonic cursor,
//!   grown in whole pages
//! - **Free lists** ([`FreeListRegistry`]): one FIFO queue and one lock per
//!   segment size
//! - **Pool** ([`BufferPool`]): free list first, arena second, with counters
//!   exposed through [`MetricsSnapshot`]
//!
//! ## Quick Start
//!
//! ```rust
//! use synapsed_bufpool::{BufferPool, BufferPoolError};
//!
//! fn example() -> Result<(), BufferPoolError> {
//!     let pool = BufferPool::new(1024, 32)?;
//!     let buffer = pool.get_buffer(100)?;
//!     assert_eq!(buffer.len(), 100);
//!     pool.release_buffer(buffer)?;
//!     println!("{}", pool.metrics_snapshot());
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;
pub mod config;
pub mod error;
pub mod free_list;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod size_class;

// Re-export commonly used items
pub use arena::{BackingArena, Reservation};
pub use config::PoolConfig;
pub use error::{BufferPoolError, Result};
pub use free_list::{FreeListRegistry, Segment};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{BufferPool, BufferView};
pub use size_class::SizeClassifier;

/// Version information for the Synapsed Buffer Pool library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the Synapsed Buffer Pool library
pub const NAME: &str = env!("CARGO_PKG_NAME");
