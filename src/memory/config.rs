/*!
 * Allocator Configuration
 *
 * Strategy selection and page-size validation
 */

use crate::core::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::core::types::Size;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable selecting the strategy
pub const STRATEGY_ENV: &str = "KMA_STRATEGY";

/// Environment variable overriding the page size
pub const PAGE_SIZE_ENV: &str = "KMA_PAGE_SIZE";

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid page size {size}: {reason}")]
    #[diagnostic(
        code(config::invalid_page_size),
        help("Page sizes must be powers of two between 256 and 32768 bytes.")
    )]
    InvalidPageSize { size: Size, reason: String },

    #[error("Unknown allocation strategy: {0}")]
    #[diagnostic(
        code(config::unknown_strategy),
        help("Use free_list, buddy or boundary_tag.")
    )]
    UnknownStrategy(String),

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse))]
    Parse(#[from] serde_json::Error),
}

/// Allocation strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Segregated power-of-two free lists
    FreeList,
    /// Binary buddy system over a per-page segment tree
    Buddy,
    /// First-fit boundary-tag resource map
    BoundaryTag,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::FreeList,
        StrategyKind::Buddy,
        StrategyKind::BoundaryTag,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::FreeList => "free_list",
            StrategyKind::Buddy => "buddy",
            StrategyKind::BoundaryTag => "boundary_tag",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free_list" | "freelist" | "p2fl" => Ok(StrategyKind::FreeList),
            "buddy" | "bud" => Ok(StrategyKind::Buddy),
            "boundary_tag" | "boundarytag" | "rm" => Ok(StrategyKind::BoundaryTag),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Allocator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Strategy to instantiate
    pub strategy: StrategyKind,
    /// Page size requested from the provider
    pub page_size: Size,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::FreeList,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AllocatorConfig {
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, page_size: Size) -> Self {
        self.page_size = page_size;
        self
    }

    /// Build from `KMA_STRATEGY` / `KMA_PAGE_SIZE`, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(strategy) = std::env::var(STRATEGY_ENV) {
            config.strategy = strategy.parse()?;
        }
        if let Ok(raw) = std::env::var(PAGE_SIZE_ENV) {
            config.page_size = raw.trim().parse().map_err(|_| ConfigError::InvalidPageSize {
                size: 0,
                reason: format!("{} is not a number: {:?}", PAGE_SIZE_ENV, raw),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_page_size(self.page_size)
    }
}

/// Check that a page size is usable by every strategy
pub fn validate_page_size(size: Size) -> Result<(), ConfigError> {
    let reason = if !size.is_power_of_two() {
        "not a power of two"
    } else if size < MIN_PAGE_SIZE {
        "smaller than the minimum page size"
    } else if size > MAX_PAGE_SIZE {
        "larger than the maximum page size"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidPageSize {
        size,
        reason: reason.into(),
    })
}
