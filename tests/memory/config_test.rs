/*!
 * Configuration Tests
 */

use kma::memory::config::{PAGE_SIZE_ENV, STRATEGY_ENV};
use kma::{Allocator, AllocatorConfig, AnyAllocator, ConfigError, StrategyKind};
use pretty_assertions::assert_eq;

#[test]
fn test_config_from_env() {
    std::env::set_var(STRATEGY_ENV, "bud");
    std::env::set_var(PAGE_SIZE_ENV, "4096");
    let config = AllocatorConfig::from_env().unwrap();
    assert_eq!(config.strategy, StrategyKind::Buddy);
    assert_eq!(config.page_size, 4096);

    std::env::set_var(PAGE_SIZE_ENV, "lots");
    assert!(matches!(
        AllocatorConfig::from_env(),
        Err(ConfigError::InvalidPageSize { .. })
    ));

    std::env::set_var(STRATEGY_ENV, "slab");
    assert!(matches!(
        AllocatorConfig::from_env(),
        Err(ConfigError::UnknownStrategy(_))
    ));

    std::env::remove_var(STRATEGY_ENV);
    std::env::remove_var(PAGE_SIZE_ENV);
    assert_eq!(AllocatorConfig::from_env().unwrap(), AllocatorConfig::default());
}

#[test]
fn test_config_drives_allocator() {
    let config = AllocatorConfig::from_json(r#"{"strategy":"boundary_tag","page_size":1024}"#)
        .unwrap();
    let mut alloc = AnyAllocator::with_heap_provider(&config).unwrap();
    assert_eq!(alloc.kind(), StrategyKind::BoundaryTag);

    let stats = alloc.stats();
    assert_eq!(stats.page_size, 1024);
    assert_eq!(stats.max_request, 1024 - 8 - 24);

    let ptr = alloc.allocate(stats.max_request).unwrap();
    alloc.release(ptr, stats.max_request);
    assert_eq!(alloc.pages_held(), 0);
}

#[test]
fn test_stats_serialize() {
    let config = AllocatorConfig::new(StrategyKind::FreeList);
    let alloc = AnyAllocator::with_heap_provider(&config).unwrap();
    let json = serde_json::to_value(alloc.stats()).unwrap();
    assert_eq!(json["strategy"], "free_list");
    assert_eq!(json["pages_held"], 0);
}
