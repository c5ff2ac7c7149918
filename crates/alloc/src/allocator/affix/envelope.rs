//! Envelope records and layout
//!
//! ```text
//! base                          payload                      suffix
//!  |<---------- lead ---------->|<---- size ---->|<- pad ->|
//!  [pad][PrefixEnvelope<P>     ][payload         ][pad     ][SuffixEnvelope<S>]
//!        ^ payload - size_of::<PrefixEnvelope<P>>()
//! ```
//!
//! `lead` is a multiple of the effective alignment, so `payload` keeps the
//! alignment of `base`. The suffix sits at the first address after the
//! payload aligned for `SuffixEnvelope<S>`.

use core::mem::{align_of, size_of};

#[cfg(doc)]
use crate::core::AllocatorId;

use crate::utils::checked_round_to_aligned;

/// Hidden record in front of a payload
///
/// Stamps are plain words so that an overrun leaving arbitrary bytes behind
/// still reads back as a valid (mismatching) value.
#[repr(C)]
pub(super) struct PrefixEnvelope<P> {
    /// Raw [`AllocatorId`] of the issuing instance
    pub(super) stamp: usize,
    pub(super) size: usize,
    pub(super) lead: usize,
    pub(super) prefix: P,
}

/// Hidden record after a payload
#[repr(C)]
pub(super) struct SuffixEnvelope<S> {
    /// Raw [`AllocatorId`] of the issuing instance
    pub(super) stamp: usize,
    pub(super) suffix: S,
}

/// Offsets of one envelope, relative to the start of the wrapped block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct EnvelopeLayout {
    /// Offset of the payload
    pub(super) lead: usize,
    /// Offset of the suffix envelope
    pub(super) suffix: usize,
    /// Bytes requested from the wrapped allocator
    pub(super) total: usize,
}

impl EnvelopeLayout {
    /// Alignment to request from the wrapped allocator for a payload aligned
    /// to `align`
    pub(super) fn effective_align<P, S>(align: usize) -> usize {
        align
            .max(align_of::<PrefixEnvelope<P>>())
            .max(align_of::<SuffixEnvelope<S>>())
    }

    /// Layout for a `size`-byte payload aligned to `align`; `None` on overflow
    pub(super) fn new<P, S>(size: usize, align: usize) -> Option<Self> {
        let align = Self::effective_align::<P, S>(align);
        let lead = checked_round_to_aligned(size_of::<PrefixEnvelope<P>>(), align)?;
        Self::with_lead::<S>(lead, size)
    }

    /// Layout of an issued payload, from the `lead` stored in its prefix
    pub(super) fn with_lead<S>(lead: usize, size: usize) -> Option<Self> {
        let end = lead.checked_add(size)?;
        let suffix = checked_round_to_aligned(end, align_of::<SuffixEnvelope<S>>())?;
        let total = suffix.checked_add(size_of::<SuffixEnvelope<S>>())?;
        Some(Self { lead, suffix, total })
    }
}
