//! One archive slot of the manager.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use forgepack_pack2::{Asset, Pack2};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::budget::MemoryBudget;
use crate::lease::LeaseCounter;
use crate::{Error, Result};

/// Buffer of a resident archive.
pub(crate) struct Resident {
    pub buffer: Bytes,
    pub generation: u64,
}

/// Why an archive buffer could not be produced.
#[derive(Debug)]
pub(crate) enum LoadFailure {
    /// The memory budget refused the bytes; `shortfall` must be freed first.
    Budget { needed: u64, shortfall: u64 },
    /// The allocator refused a buffer of `needed` bytes.
    Alloc { needed: u64 },
    Io(io::Error),
}

/// State kept for every archive path handed to the manager.
///
/// The index built at construction is permanent. The buffer comes and goes
/// with paging; handles into it are cached per generation.
pub(crate) struct ArchiveSlot {
    path: PathBuf,
    pack: Option<Pack2>,
    load_error: Option<Error>,
    pub resident: RwLock<Option<Resident>>,
    handles: Mutex<FxHashMap<u64, (u64, Arc<Asset>)>>,
    pub leases: Arc<LeaseCounter>,
    generation: AtomicU64,
}

impl ArchiveSlot {
    /// Read, parse and index an archive.
    ///
    /// Failures are kept in the slot rather than returned, so one bad file
    /// does not stop the others from loading. The buffer stays resident only
    /// if the budget has room for it.
    pub fn open(path: PathBuf, budget: &MemoryBudget) -> Self {
        let mut slot = Self {
            path,
            pack: None,
            load_error: None,
            resident: RwLock::new(None),
            handles: Mutex::new(FxHashMap::default()),
            leases: Arc::new(LeaseCounter::default()),
            generation: AtomicU64::new(0),
        };

        match slot.read_and_parse() {
            Ok((pack, buffer)) => {
                let len = buffer.len() as u64;
                if budget.try_reserve(len).is_ok() {
                    let generation = slot.next_generation();
                    *slot.resident.get_mut() = Some(Resident { buffer, generation });
                } else {
                    debug!(path = %slot.path.display(), len, "over budget, leaving archive paged out");
                }
                slot.pack = Some(pack);
            }
            Err(e) => {
                warn!(path = %slot.path.display(), "failed to load archive: {e}");
                slot.load_error = Some(e);
            }
        }

        slot
    }

    fn read_and_parse(&self) -> Result<(Pack2, Bytes)> {
        let (mut file, len) = open_file(&self.path).map_err(|source| self.io_error(source))?;
        let buffer = read_file(&mut file, len).map_err(|failure| self.failure_error(failure, 1))?;
        let pack = Pack2::parse(&buffer).map_err(|source| self.pack_error(source))?;
        Ok((pack, buffer))
    }

    /// Read the archive again, accounting the bytes against `budget`.
    pub fn reload(&self, budget: &MemoryBudget) -> std::result::Result<Bytes, LoadFailure> {
        let (mut file, len) = open_file(&self.path).map_err(LoadFailure::Io)?;
        budget
            .try_reserve(len)
            .map_err(|shortfall| LoadFailure::Budget { needed: len, shortfall })?;

        let buffer = read_file(&mut file, len);
        if buffer.is_err() {
            budget.release(len);
        }
        buffer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn pack(&self) -> Option<&Pack2> {
        self.pack.as_ref()
    }

    /// The parsed archive, or `ArchiveUnavailable` if it never loaded.
    pub fn available(&self) -> Result<&Pack2> {
        self.pack.as_ref().ok_or_else(|| Error::ArchiveUnavailable {
            path: self.path.clone(),
        })
    }

    pub fn load_error(&self) -> Option<&Error> {
        self.load_error.as_ref()
    }

    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Cached handle for `hash`, creating one from the resident buffer on a
    /// miss. Handles from an older generation are discarded.
    pub fn handle(&self, resident: &Resident, hash: u64, name: Option<&str>) -> Result<Arc<Asset>> {
        let mut handles = self.handles.lock();
        if let Some((generation, asset)) = handles.get(&hash) {
            if *generation == resident.generation {
                return Ok(Arc::clone(asset));
            }
        }

        let pack = self.available()?;
        let record = pack
            .lookup_hash(&resident.buffer, hash)
            .map_err(|source| self.pack_error(source))?;
        let asset = Arc::new(
            Asset::from_buffer(record, name.map(str::to_owned), &resident.buffer)
                .map_err(|source| self.pack_error(source))?,
        );
        handles.insert(hash, (resident.generation, Arc::clone(&asset)));
        Ok(asset)
    }

    pub fn clear_handles(&self) {
        self.handles.lock().clear();
    }

    pub fn io_error(&self, source: io::Error) -> Error {
        Error::Io {
            path: self.path.clone(),
            source,
        }
    }

    pub fn pack_error(&self, source: forgepack_pack2::Error) -> Error {
        match source {
            forgepack_pack2::Error::HeaderMismatch => Error::ArchiveChanged {
                path: self.path.clone(),
            },
            source => Error::Pack {
                path: self.path.clone(),
                source,
            },
        }
    }

    pub fn failure_error(&self, failure: LoadFailure, attempts: u32) -> Error {
        match failure {
            LoadFailure::Io(source) => self.io_error(source),
            LoadFailure::Budget { needed, .. } | LoadFailure::Alloc { needed } => {
                Error::ResourceExhausted {
                    path: self.path.clone(),
                    needed,
                    attempts,
                }
            }
        }
    }
}

fn open_file(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

/// Read exactly `len` bytes into a fresh buffer.
///
/// The buffer is reserved up front so an oversized archive surfaces as
/// `Alloc` instead of aborting the process.
fn read_file(file: &mut File, len: u64) -> std::result::Result<Bytes, LoadFailure> {
    let size = usize::try_from(len).map_err(|_| LoadFailure::Alloc { needed: len })?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| LoadFailure::Alloc { needed: len })?;

    file.take(len)
        .read_to_end(&mut buffer)
        .map_err(LoadFailure::Io)?;
    if buffer.len() != size {
        return Err(LoadFailure::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("archive truncated while reading: {} of {len} bytes", buffer.len()),
        )));
    }

    Ok(Bytes::from(buffer))
}
