//! Affix allocator
//!
//! Wraps any allocator and surrounds every payload with hidden prefix and
//! suffix metadata. The caller's block covers only the payload.
//!
//! ## Modules
//! - `allocator` - `AffixAllocator` and its ownership checks
//! - `envelope` - envelope records and the layout arithmetic around a payload
//! - `source` - ready-made metadata: `SourcePrefix`, `NoSuffix`

pub mod allocator;
mod envelope;
pub mod source;

pub use allocator::AffixAllocator;
pub use source::{NoSuffix, SourcePrefix};
