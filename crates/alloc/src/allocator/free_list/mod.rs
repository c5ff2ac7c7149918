//! Free-list allocator
//!
//! Recycles fixed-size blocks for requests inside a size tolerance window and
//! forwards everything else to an upstream allocator.
//!
//! ## Modules
//! - `allocator` - `FreeListAllocator` with its intrusive recycle list
//! - `config` - block size and tolerance window

pub mod allocator;
pub mod config;

pub use allocator::FreeListAllocator;
pub use config::FreeListConfig;
