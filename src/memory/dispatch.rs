/*!
 * Strategy Dispatch
 * Runtime selection of an allocation strategy from configuration
 */

use super::config::{AllocatorConfig, ConfigError, StrategyKind};
use super::page::HeapPageProvider;
use super::strategies::{BoundaryTagAllocator, BuddyAllocator, FreeListAllocator};
use super::traits::{Allocator, PageProvider};
use super::types::{AllocResult, AllocatorStats, Pointer};
use crate::core::types::Size;
use tracing::info;

/// One of the three strategies, chosen at runtime
pub enum AnyAllocator<P: PageProvider> {
    FreeList(FreeListAllocator<P>),
    Buddy(BuddyAllocator<P>),
    BoundaryTag(BoundaryTagAllocator<P>),
}

impl<P: PageProvider> AnyAllocator<P> {
    /// Build the configured strategy over `provider`
    ///
    /// The provider's page size must match the configured one.
    pub fn from_config(config: &AllocatorConfig, provider: P) -> Result<Self, ConfigError> {
        config.validate()?;
        if provider.page_size() != config.page_size {
            return Err(ConfigError::InvalidPageSize {
                size: provider.page_size(),
                reason: format!("provider pages differ from configured {}", config.page_size),
            });
        }
        let allocator = match config.strategy {
            StrategyKind::FreeList => AnyAllocator::FreeList(FreeListAllocator::new(provider)?),
            StrategyKind::Buddy => AnyAllocator::Buddy(BuddyAllocator::new(provider)?),
            StrategyKind::BoundaryTag => {
                AnyAllocator::BoundaryTag(BoundaryTagAllocator::new(provider)?)
            }
        };
        info!(
            strategy = %config.strategy,
            page_size = config.page_size,
            "allocator initialized"
        );
        Ok(allocator)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            AnyAllocator::FreeList(_) => StrategyKind::FreeList,
            AnyAllocator::Buddy(_) => StrategyKind::Buddy,
            AnyAllocator::BoundaryTag(_) => StrategyKind::BoundaryTag,
        }
    }

    pub fn provider(&self) -> &P {
        match self {
            AnyAllocator::FreeList(a) => a.provider(),
            AnyAllocator::Buddy(a) => a.provider(),
            AnyAllocator::BoundaryTag(a) => a.provider(),
        }
    }

    fn inner(&self) -> &dyn Allocator {
        match self {
            AnyAllocator::FreeList(a) => a,
            AnyAllocator::Buddy(a) => a,
            AnyAllocator::BoundaryTag(a) => a,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Allocator {
        match self {
            AnyAllocator::FreeList(a) => a,
            AnyAllocator::Buddy(a) => a,
            AnyAllocator::BoundaryTag(a) => a,
        }
    }
}

impl AnyAllocator<HeapPageProvider> {
    /// Build the configured strategy over a fresh heap provider
    pub fn with_heap_provider(config: &AllocatorConfig) -> Result<Self, ConfigError> {
        let provider = HeapPageProvider::new(config.page_size)?;
        Self::from_config(config, provider)
    }
}

impl<P: PageProvider> Allocator for AnyAllocator<P> {
    fn allocate(&mut self, size: Size) -> AllocResult<Pointer> {
        self.inner_mut().allocate(size)
    }

    fn release(&mut self, ptr: Pointer, size: Size) {
        self.inner_mut().release(ptr, size)
    }

    fn pages_held(&self) -> usize {
        self.inner().pages_held()
    }

    fn max_request(&self) -> Size {
        self.inner().max_request()
    }

    fn stats(&self) -> AllocatorStats {
        self.inner().stats()
    }
}
