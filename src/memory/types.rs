/*!
 * Memory Types
 * Common types for the allocation strategies
 */

use crate::core::types::{Address, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ptr::NonNull;
use thiserror::Error;

use super::config::StrategyKind;

/// Allocation result
pub type AllocResult<T> = Result<T, AllocError>;

/// Allocation errors
///
/// Every variant leaves the allocator state exactly as it was before the call.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AllocError {
    #[error("Zero-sized allocation requested")]
    #[diagnostic(
        code(alloc::zero_size),
        help("Allocation sizes must be greater than zero.")
    )]
    ZeroSize,

    #[error("Allocation too large: requested {requested} bytes, limit {limit} bytes")]
    #[diagnostic(
        code(alloc::too_large),
        help("A single allocation plus its header must fit in one page.")
    )]
    TooLarge { requested: Size, limit: Size },
}

/// Payload pointer handed to the host
///
/// This is the only place raw addresses cross the allocator boundary; internal
/// bookkeeping uses page ids and offsets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer(NonNull<u8>);

// A Pointer is an address; ownership of the bytes behind it follows the
// allocate/release contract, not the value itself.
unsafe impl Send for Pointer {}
unsafe impl Sync for Pointer {}

impl Pointer {
    #[inline]
    pub(crate) fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    #[inline]
    pub fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    #[inline]
    pub fn addr(self) -> Address {
        self.0.as_ptr() as Address
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer(0x{:x})", self.addr())
    }
}

impl fmt::Pointer for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}

/// Allocator statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorStats {
    pub strategy: StrategyKind,
    pub page_size: Size,
    pub pages_held: usize,
    pub live_allocations: usize,
    pub max_request: Size,
}
