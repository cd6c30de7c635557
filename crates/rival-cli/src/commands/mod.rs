//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, load_config, build_engine)
//! - `analyze` - Single-charge and bulk analysis
//! - `cache` - Cache maintenance commands (sweep, invalidate, janitor, stats)

pub mod analyze;
pub mod cache;
pub mod core;

// Re-export command functions for main.rs
pub use analyze::*;
pub use cache::*;
pub use core::*;
