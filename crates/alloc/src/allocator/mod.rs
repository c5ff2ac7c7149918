//! Allocation strategies and composition wrappers
//!
//! Terminal strategies (`system`, `stack`, `pool`, `free_list`) own or borrow
//! raw storage. Wrappers (`fallback`, `affix`) own no memory and only route
//! calls into the allocators they hold.

// Terminal allocators
mod system;

pub mod free_list;
pub mod pool;
pub mod stack;

// Composition wrappers
pub mod affix;
mod fallback;

pub use affix::{AffixAllocator, NoSuffix, SourcePrefix};
pub use fallback::FallbackAllocator;
pub use free_list::{FreeListAllocator, FreeListConfig};
pub use pool::{PoolAllocator, PoolConfig};
pub use stack::{StackAllocator, StackConfig};
pub use system::{AlignedHeapAllocator, HeapAllocator, PlatformHeap};
