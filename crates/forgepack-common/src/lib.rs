//! Common utilities for forgepack.
//!
//! This crate provides foundational types and utilities used across all forgepack crates:
//!
//! - [`BinaryReader`] - Bounds-checked binary reading from byte slices
//! - [`hash`] - The 64-bit name hash used to key pack2 asset tables
//! - [`size`] - Human-readable byte counts

mod error;
mod reader;

pub mod hash;
pub mod size;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};
