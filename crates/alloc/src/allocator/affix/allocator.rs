//! Main affix allocator implementation
//!
//! # Safety
//!
//! - Envelopes are only read at payload addresses found in the live table, so
//!   `owns` never reads memory next to a foreign pointer
//! - Prefix and suffix values are moved in on allocation and dropped in place
//!   on deallocation
//!
//! ## Invariants
//!
//! - Every live payload has a `PrefixEnvelope` ending exactly at the payload
//!   and a `SuffixEnvelope` at `align_up(payload + size, align_of::<SuffixEnvelope<S>>())`
//! - Both envelopes carry this instance's [`AllocatorId`]
//! - The block handed to the wrapped allocator is `[payload - lead, suffix + size_of::<SuffixEnvelope<S>>())`

use std::collections::HashSet;

use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use tracing::{error, trace, warn};

use super::SourcePrefix;
use super::envelope::{EnvelopeLayout, PrefixEnvelope, SuffixEnvelope};
use crate::core::{Allocator, AllocatorId, Block};
use crate::platform::DEFAULT_ALIGNMENT;

/// Surrounds every payload with a hidden `P` prefix and `S` suffix
///
/// The block returned to the caller covers exactly the requested payload;
/// the envelopes are invisible through the [`Allocator`] interface. Use
/// [`prefix`](Self::prefix) and [`suffix`](Self::suffix) to read them back.
///
/// # Examples
/// ```
/// use nebula_alloc::{AffixAllocator, Allocator, HeapAllocator, NoSuffix, SourcePrefix};
///
/// let mut alloc = AffixAllocator::<_, SourcePrefix, NoSuffix>::new(HeapAllocator::new());
/// let mut block = alloc.allocate_here(32);
/// assert_eq!(block.size(), 32);
/// assert!(alloc.prefix(&block).is_some_and(|site| site.file.ends_with(".rs")));
///
/// unsafe { alloc.deallocate(&mut block) };
/// assert!(block.is_empty());
/// ```
pub struct AffixAllocator<A, P, S> {
    /// Allocator that supplies envelope and payload together
    inner: A,

    /// Stamp written into both envelopes
    id: AllocatorId,

    /// Payload addresses issued and not yet deallocated
    live: HashSet<usize>,

    _metadata: PhantomData<(P, S)>,
}

/// Validated envelope locations of one live payload
struct Envelopes<P, S> {
    /// Start of the block the wrapped allocator issued
    base: *mut u8,
    prefix: NonNull<PrefixEnvelope<P>>,
    suffix: NonNull<SuffixEnvelope<S>>,
    layout: EnvelopeLayout,
}

impl<A: Allocator, P, S> AffixAllocator<A, P, S> {
    /// Wraps `inner`
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            id: AllocatorId::new(),
            live: HashSet::new(),
            _metadata: PhantomData,
        }
    }

    /// Identity stamped into every envelope
    pub fn id(&self) -> AllocatorId {
        self.id
    }

    /// Returns the wrapped allocator
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Number of payloads issued and not yet deallocated
    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    /// Allocates a `size`-byte payload with explicit metadata
    ///
    /// Returns an empty block, dropping `prefix` and `suffix`, if the wrapped
    /// allocator cannot supply the envelope.
    pub fn allocate_with(&mut self, size: usize, prefix: P, suffix: S, align: usize) -> Block {
        let Some(layout) = EnvelopeLayout::new::<P, S>(size, align) else {
            trace!(size, align, "affix envelope size overflows");
            return Block::EMPTY;
        };

        let outer = self
            .inner
            .allocate(layout.total, EnvelopeLayout::effective_align::<P, S>(align));
        let Some(base) = outer.as_non_null() else {
            trace!(size, total = layout.total, "wrapped allocator could not supply envelope");
            return Block::EMPTY;
        };

        // SAFETY: `outer` spans `layout.total` bytes aligned for both
        // envelopes; `lead` and `suffix` are in bounds and suitably aligned.
        let payload = unsafe {
            let payload = base.add(layout.lead);
            Self::prefix_ptr(payload).write(PrefixEnvelope {
                stamp: self.id.get(),
                size,
                lead: layout.lead,
                prefix,
            });
            base.add(layout.suffix)
                .cast::<SuffixEnvelope<S>>()
                .write(SuffixEnvelope {
                    stamp: self.id.get(),
                    suffix,
                });
            payload
        };

        self.live.insert(payload.as_ptr() as usize);
        Block::new(payload, size)
    }

    /// The prefix stored in front of `block`, if this instance owns it
    pub fn prefix(&self, block: &Block) -> Option<&P> {
        let envelope = self.envelopes(block)?;
        // SAFETY: `envelopes` validated the payload; the prefix lives until
        // the block is deallocated, which needs `&mut self`.
        Some(unsafe { &(*envelope.prefix.as_ptr()).prefix })
    }

    /// The suffix stored after `block`, if this instance owns it
    pub fn suffix(&self, block: &Block) -> Option<&S> {
        let envelope = self.envelopes(block)?;
        // SAFETY: as in `prefix`.
        Some(unsafe { &(*envelope.suffix.as_ptr()).suffix })
    }

    #[inline]
    fn prefix_ptr(payload: NonNull<u8>) -> NonNull<PrefixEnvelope<P>> {
        // SAFETY: payloads sit at `lead >= size_of::<PrefixEnvelope<P>>()`
        // bytes into the block issued by `inner`.
        unsafe { payload.cast::<PrefixEnvelope<P>>().sub(1) }
    }

    /// Locates and validates both envelopes of a live payload
    fn envelopes(&self, block: &Block) -> Option<Envelopes<P, S>> {
        let payload = block.as_non_null()?;
        if !self.live.contains(&block.addr()) {
            return None;
        }

        let prefix = Self::prefix_ptr(payload);
        // SAFETY: the payload is live, so its prefix envelope was written by
        // `allocate_with` and not yet dropped.
        let (stamp, size, lead) = unsafe {
            let envelope = prefix.as_ptr();
            ((*envelope).stamp, (*envelope).size, (*envelope).lead)
        };
        if stamp != self.id.get() || size != block.size() {
            error!(id = %self.id, addr = block.addr(), "affix prefix envelope corrupted");
            return None;
        }

        let layout = EnvelopeLayout::with_lead::<S>(lead, size)?;
        // SAFETY: `base + layout.suffix` is where `allocate_with` put the
        // suffix for this lead and size.
        let suffix = unsafe {
            payload
                .sub(layout.lead)
                .add(layout.suffix)
                .cast::<SuffixEnvelope<S>>()
        };
        // SAFETY: as above; the suffix envelope is initialized.
        if unsafe { (*suffix.as_ptr()).stamp } != self.id.get() {
            error!(id = %self.id, addr = block.addr(), size, "affix suffix envelope corrupted");
            return None;
        }

        Some(Envelopes {
            base: payload.as_ptr().wrapping_sub(layout.lead),
            prefix,
            suffix,
            layout,
        })
    }
}

impl<A: Allocator, S: Default> AffixAllocator<A, SourcePrefix, S> {
    /// Allocates `size` bytes and records the caller's source location
    #[track_caller]
    pub fn allocate_here(&mut self, size: usize) -> Block {
        self.allocate_with(size, SourcePrefix::caller(), S::default(), DEFAULT_ALIGNMENT)
    }
}

unsafe impl<A: Allocator, P: Default, S: Default> Allocator for AffixAllocator<A, P, S> {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        self.allocate_with(size, P::default(), S::default(), align)
    }

    unsafe fn deallocate(&mut self, block: &mut Block) {
        let block = block.take();
        if block.is_empty() {
            return;
        }
        let Some(envelopes) = self.envelopes(&block) else {
            warn!(id = %self.id, addr = block.addr(), "affix allocator ignored a block it does not own");
            return;
        };

        // SAFETY: both envelopes were validated and are dropped exactly once.
        unsafe {
            ptr::drop_in_place(envelopes.prefix.as_ptr());
            ptr::drop_in_place(envelopes.suffix.as_ptr());
        }
        self.live.remove(&block.addr());

        let mut outer = Block::from_raw(envelopes.base, envelopes.layout.total);
        // SAFETY: `outer` is exactly the block `inner` returned in
        // `allocate_with`.
        unsafe { self.inner.deallocate(&mut outer) };
    }

    #[inline]
    fn owns(&self, block: &Block) -> bool {
        self.envelopes(block).is_some()
    }
}

impl<A: fmt::Debug, P, S> fmt::Debug for AffixAllocator<A, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffixAllocator")
            .field("inner", &self.inner)
            .field("id", &self.id)
            .field("live", &self.live.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{HeapAllocator, NoSuffix, PoolAllocator, StackAllocator};
    use crate::utils::is_aligned;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    struct Canary(u64);

    type Tagged<A> = AffixAllocator<A, SourcePrefix, Canary>;

    #[test]
    fn test_payload_size_is_exact() {
        let mut alloc = Tagged::new(HeapAllocator::new());
        for size in [0, 1, 7, 64, 1000] {
            let mut block = alloc.allocate(size, 8);
            assert_eq!(block.size(), size);
            assert!(alloc.owns(&block));
            unsafe { alloc.deallocate(&mut block) };
            assert!(block.is_empty());
        }
        assert_eq!(alloc.live_blocks(), 0);
    }

    #[test]
    fn test_metadata_round_trip() {
        let mut alloc = Tagged::new(HeapAllocator::new());
        let site = SourcePrefix::caller();
        let mut block = alloc.allocate_with(24, site, Canary(0xFEED_FACE), 8);

        unsafe { block.as_mut_slice().fill(0xAB) };
        assert_eq!(alloc.prefix(&block), Some(&site));
        assert_eq!(alloc.suffix(&block), Some(&Canary(0xFEED_FACE)));

        unsafe { alloc.deallocate(&mut block) };
    }

    #[test]
    fn test_allocate_here_records_caller() {
        let mut alloc = AffixAllocator::<_, SourcePrefix, NoSuffix>::new(HeapAllocator::new());
        let mut block = alloc.allocate_here(16);
        let line = line!() - 1;

        let site = alloc.prefix(&block).copied().unwrap();
        assert!(site.file.ends_with("allocator.rs"));
        assert_eq!(site.line, line);
        unsafe { alloc.deallocate(&mut block) };
    }

    #[test]
    fn test_foreign_block_not_owned() {
        let mut ours = Tagged::new(HeapAllocator::new());
        let mut theirs = Tagged::new(HeapAllocator::new());

        let mut foreign = theirs.allocate(32, 8);
        assert!(!ours.owns(&foreign));
        assert!(ours.prefix(&foreign).is_none());

        let mut copy = foreign;
        unsafe { ours.deallocate(&mut copy) };
        assert!(copy.is_empty());
        assert!(theirs.owns(&foreign));

        unsafe { theirs.deallocate(&mut foreign) };
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut alloc = Tagged::new(HeapAllocator::new());
        let block = alloc.allocate(16, 8);
        let (mut first, mut second) = (block, block);
        unsafe {
            alloc.deallocate(&mut first);
            alloc.deallocate(&mut second);
        }
        assert!(!alloc.owns(&block));
    }

    #[test]
    fn test_overrun_detected() {
        let mut alloc = AffixAllocator::<_, NoSuffix, Canary>::new(HeapAllocator::new());
        let block = alloc.allocate(8, 8);
        assert!(alloc.owns(&block));

        let layout = EnvelopeLayout::new::<NoSuffix, Canary>(8, 8).unwrap();
        let spill = layout.suffix - layout.lead + core::mem::size_of::<usize>();
        // Overrun the payload into the suffix stamp; the bytes still belong to
        // the envelope allocation.
        unsafe { ptr::write_bytes(block.as_ptr(), 0, spill) };
        assert!(!alloc.owns(&block));
    }

    #[test]
    fn test_arena_state_restored() {
        let mut alloc = Tagged::new(StackAllocator::<512>::new().unwrap());
        let mut block = alloc.allocate(40, 8);
        assert!(alloc.inner().used() > 40);

        unsafe { alloc.deallocate(&mut block) };
        assert_eq!(alloc.inner().used(), 0);
    }

    #[test]
    fn test_pool_state_restored() {
        let pool = PoolAllocator::new(HeapAllocator::new(), 128, 2).unwrap();
        let mut alloc = Tagged::new(pool);
        let mut block = alloc.allocate(16, 8);
        assert_eq!(alloc.inner().free_slots(), 1);

        unsafe { alloc.deallocate(&mut block) };
        assert_eq!(alloc.inner().free_slots(), 2);
    }

    #[test]
    fn test_over_aligned_payload() {
        let mut alloc = Tagged::new(crate::allocator::AlignedHeapAllocator::new());
        let mut block = alloc.allocate(100, 256);
        assert!(is_aligned(block.addr(), 256));
        assert!(alloc.owns(&block));
        unsafe { alloc.deallocate(&mut block) };
    }

    #[test]
    fn test_prefix_values_are_dropped() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut alloc = AffixAllocator::<_, Option<Rc<()>>, NoSuffix>::new(HeapAllocator::new());
        let mut block = alloc.allocate_with(8, Some(Rc::clone(&tracker)), NoSuffix, 8);
        assert_eq!(Rc::strong_count(&tracker), 2);

        unsafe { alloc.deallocate(&mut block) };
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
