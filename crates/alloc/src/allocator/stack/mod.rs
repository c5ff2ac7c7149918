//! Arena (stack) allocator
//!
//! ## Modules
//! - `allocator` - `StackAllocator` with bump allocation and LIFO reclaim
//! - `config` - debug fill patterns
pub mod allocator;
pub mod config;

pub use allocator::StackAllocator;
pub use config::StackConfig;
