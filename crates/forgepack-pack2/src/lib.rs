//! pack2 archive reader.
//!
//! pack2 is a flat archive format used to ship game assets. A file holds a
//! 24-byte header, the raw asset payloads, and a table of fixed-size 32-byte
//! records describing each payload. Assets are addressed by a 64-bit hash of
//! their (uppercased) name; the names themselves are not stored, except in an
//! optional `{NAMELIST}` asset.
//!
//! This crate covers the buffer-level pieces:
//!
//! - [`Pack2`] - header validation, the asset table view and the name index
//! - [`Asset`] - a decode session for one record with memoized output
//! - [`Inflate`] / [`ZlibInflater`] - the decompressor seam for zlib payloads
//! - [`Namelist`] - hash to name mapping recovered from `{NAMELIST}`
//!
//! Reading files, paging and eviction live in `forgepack-manager`.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use forgepack_pack2::{Asset, Pack2};
//!
//! let buffer = Bytes::from(std::fs::read("assets_x64_0.pack2")?);
//! let pack = Pack2::parse(&buffer)?;
//!
//! let record = pack.lookup(&buffer, "ui_textures.xml")?;
//! let asset = Asset::from_buffer(record, Some("ui_textures.xml".into()), &buffer)?;
//! println!("{} bytes", asset.data()?.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod asset;
mod decompress;
mod error;
mod format;
mod namelist;
mod pack;

#[cfg(any(test, feature = "test-util"))]
pub mod writer;

pub use asset::Asset;
pub use decompress::{decode, decode_with, declared_size, Inflate, ZlibInflater};
pub use error::{DecodeError, Error, Result};
pub use format::{AssetRecord, PackHeader, RawAssetRecord, RawPackHeader, HEADER_SIZE, MAGIC, RECORD_SIZE};
pub use namelist::{Namelist, NAMELIST_NAME};
pub use pack::{AssetTable, Pack2};
