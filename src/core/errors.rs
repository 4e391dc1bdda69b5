/*!
 * Error Types
 * Centralized error re-exports
 */

pub use crate::memory::config::ConfigError;
pub use crate::memory::types::AllocError;
