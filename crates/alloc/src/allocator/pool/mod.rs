//! Pool allocator implementation
//!
//! Fixed-size slots carved from one upstream region and recycled through an
//! intrusive free list. O(1) allocation and deallocation.
//!
//! ## Modules
//! - `allocator` - `PoolAllocator` over any upstream [`Allocator`](crate::Allocator)
//! - `config` - slot geometry and debug fill pattern

pub mod allocator;
pub mod config;

pub use allocator::PoolAllocator;
pub use config::PoolConfig;
