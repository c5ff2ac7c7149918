//! Platform facts consumed by the allocators as constants
//!
//! Everything here is resolved at compile time from the target triple.

use core::fmt;
use core::mem;

/// Size of a machine word in bytes
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// Width of a pointer in bits
pub const POINTER_WIDTH_BITS: u32 = usize::BITS;

/// Alignment the platform `malloc` guarantees for any request
///
/// This is the alignment of `max_align_t` on the supported C runtimes: two
/// machine words. Allocators round their internal footprints to it.
pub const DEFAULT_ALIGNMENT: usize = 2 * WORD_SIZE;

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))] {
        /// Size of a CPU cache line in bytes
        pub const CACHE_LINE_SIZE: usize = 128;
    } else {
        /// Size of a CPU cache line in bytes
        pub const CACHE_LINE_SIZE: usize = 64;
    }
}

const _: () = assert!(DEFAULT_ALIGNMENT.is_power_of_two());
const _: () = assert!(CACHE_LINE_SIZE.is_power_of_two());

/// Operating system family of the compilation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Microsoft Windows
    Windows,
    /// Linux (excluding Android)
    Linux,
    /// Android
    Android,
    /// macOS
    MacOs,
    /// iOS
    Ios,
    /// FreeBSD, OpenBSD, NetBSD, DragonFly
    Bsd,
    /// WebAssembly / Emscripten
    Wasm,
    /// Anything else
    Other,
}

impl Os {
    /// Returns the OS family this crate was compiled for
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(any(
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            Self::Bsd
        } else if cfg!(any(target_family = "wasm", target_os = "emscripten")) {
            Self::Wasm
        } else {
            Self::Other
        }
    }

    /// Whether the family provides POSIX memory APIs (`posix_memalign`)
    pub const fn is_posix(self) -> bool {
        matches!(
            self,
            Self::Linux | Self::Android | Self::MacOs | Self::Ios | Self::Bsd
        )
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Android => "android",
            Self::MacOs => "macos",
            Self::Ios => "ios",
            Self::Bsd => "bsd",
            Self::Wasm => "wasm",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Whether the target stores multi-byte values little-endian
#[inline]
pub const fn is_little_endian() -> bool {
    cfg!(target_endian = "little")
}
