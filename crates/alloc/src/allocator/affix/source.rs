//! Metadata types for affix envelopes

use core::fmt;
use core::panic::Location;

/// Allocation site: file, line and column of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourcePrefix {
    /// Source file
    pub file: &'static str,
    /// Line number, 1-based
    pub line: u32,
    /// Column number, 1-based
    pub column: u32,
}

impl SourcePrefix {
    /// Captures the location of the (tracked) caller
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourcePrefix {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourcePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Empty suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NoSuffix;
