//! Forgepack - pack2 game archive reading library.
//!
//! This crate provides a unified interface to the forgepack crates.
//!
//! # Crates
//!
//! - [`forgepack_common`] - Common utilities (binary reading, name hashing, sizes)
//! - [`forgepack_pack2`] - pack2 archive parsing and asset decoding
//! - [`forgepack_manager`] - Multi-archive lookup with paging and eviction
//!
//! # Example
//!
//! ```no_run
//! use forgepack::prelude::*;
//!
//! let manager = Manager::open_glob("Resources/Assets/*.pack2", ManagerConfig::default())?;
//! let names = manager.namelist();
//!
//! let asset = manager.get("Amerish.zone")?;
//! println!(
//!     "{}: {} bytes",
//!     names.get(asset.name_hash()).unwrap_or("?"),
//!     asset.data()?.len()
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use forgepack_common as common;
pub use forgepack_manager as manager;
pub use forgepack_pack2 as pack2;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use forgepack_common::hash::hash_name;
    pub use forgepack_common::BinaryReader;
    pub use forgepack_manager::{AssetLease, ExportStats, Manager, ManagerConfig, ManagerStats};
    pub use forgepack_pack2::{Asset, AssetRecord, Namelist, Pack2, PackHeader};
}

pub use forgepack_manager::Manager;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
