//! Composable allocation strategies for Nebula
//!
//! This crate provides a family of interchangeable allocators that share one
//! narrow capability contract ([`Allocator`]), together with generic wrappers
//! that combine them without dynamic dispatch:
//!
//! - [`HeapAllocator`] / [`AlignedHeapAllocator`]: pass-through to the
//!   platform allocator, always report ownership
//! - [`StackAllocator`]: bump allocation over a fixed region, LIFO reclaim
//! - [`PoolAllocator`]: fixed-size slots recycled through an intrusive list
//! - [`FreeListAllocator`]: recycles blocks within a size tolerance window
//! - [`FallbackAllocator`]: try one allocator, then another
//! - [`AffixAllocator`]: hidden prefix/suffix metadata around each payload
//!
//! Every strategy hands out a [`Block`]. An empty block is the only failure
//! signal; allocators never panic or abort on exhaustion.
//!
//! # Example
//!
//! ```
//! use nebula_alloc::{Allocator, FallbackAllocator, HeapAllocator, StackAllocator};
//!
//! # fn main() -> nebula_alloc::AllocResult<()> {
//! let mut alloc = FallbackAllocator::new(StackAllocator::<64>::new()?, HeapAllocator::new());
//!
//! let mut small = alloc.allocate(16, 8);
//! let mut large = alloc.allocate(128, 8);
//! assert!(alloc.primary().owns(&small));
//! assert!(!alloc.primary().owns(&large));
//!
//! unsafe {
//!     alloc.deallocate(&mut large);
//!     alloc.deallocate(&mut small);
//! }
//! assert!(small.is_empty() && large.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Threading
//!
//! No allocator in this crate synchronizes internally. Share a composed
//! allocator across threads only behind an external lock around the whole
//! chain.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![allow(unsafe_code)]

pub mod allocator;
pub mod core;
pub mod error;
pub mod object;
pub mod platform;
pub mod utils;

pub use allocator::{
    AffixAllocator, AlignedHeapAllocator, FallbackAllocator, FreeListAllocator, FreeListConfig,
    HeapAllocator, NoSuffix, PlatformHeap, PoolAllocator, PoolConfig, SourcePrefix, StackAllocator,
    StackConfig,
};
pub use crate::core::{Allocator, AllocatorId, Block};
pub use error::{AllocError, AllocResult};
pub use object::{ArrayInstance, Instance};
pub use utils::round_to_aligned;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
