//! Core types shared by every allocator
//!
//! - `block` - the `Block` value passed between all operations
//! - `id` - per-instance identity used for ownership stamps
//! - `traits` - the `Allocator` capability contract

pub mod block;
pub mod id;
pub mod traits;

pub use block::Block;
pub use id::AllocatorId;
pub use traits::Allocator;
