//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (load_config, apply_overrides)
//! - `fetch` - Online commands (fetch, dump)
//! - `reconcile` - Offline reconciliation of a history dump

pub mod core;
pub mod fetch;
pub mod reconcile;

// Re-export command functions for main.rs
pub use core::*;
pub use fetch::*;
pub use reconcile::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
