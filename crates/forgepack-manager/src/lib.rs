//! Multi-archive pack2 manager.
//!
//! A [`Manager`] owns a set of pack2 archives and resolves asset names across
//! all of them through one global index. Archives are read and indexed in
//! parallel when the manager is built. Their buffers may be evicted later to
//! stay within a memory budget and are paged back in on the next lookup.
//!
//! - Lookups hand out [`AssetLease`]s. An archive with a live lease is never
//!   evicted.
//! - A failed page-in evicts unused archives and retries, up to
//!   [`ManagerConfig::max_load_attempts`] times, before reporting
//!   [`Error::ResourceExhausted`].
//! - [`Manager::export_by_magic`] writes every asset whose bytes start with a
//!   given signature to disk.
//!
//! # Example
//!
//! ```no_run
//! use forgepack_manager::{Manager, ManagerConfig};
//!
//! let config = ManagerConfig::default().with_memory_limit(Some(512 << 20));
//! let manager = Manager::open_glob("Resources/Assets/*.pack2", config)?;
//!
//! for (id, path, error) in manager.load_errors() {
//!     eprintln!("archive {id} ({}) failed: {error}", path.display());
//! }
//!
//! let asset = manager.get("ui_textures.xml")?;
//! std::fs::write("ui_textures.xml", asset.data()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod budget;
mod config;
mod error;
mod export;
mod lease;
mod manager;

pub use config::{ManagerConfig, DEFAULT_MAX_LOAD_ATTEMPTS};
pub use error::{Error, Result};
pub use export::{ExportStats, DEFAULT_EXPORT_DIR, DEFAULT_EXPORT_EXT};
pub use lease::AssetLease;
pub use manager::{Manager, ManagerStats};
