//! The archive manager.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use forgepack_common::hash::hash_name;
use forgepack_common::size::human_bytes;
use forgepack_pack2::{Asset, AssetRecord, Namelist, NAMELIST_NAME};
use parking_lot::{Mutex, MutexGuard, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::archive::{ArchiveSlot, LoadFailure, Resident};
use crate::budget::MemoryBudget;
use crate::config::ManagerConfig;
use crate::export::{export_file_name, normalize_extension, ExportStats};
use crate::lease::{AssetLease, LeaseGuard};
use crate::{Error, Result};

/// Snapshot of manager state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ManagerStats {
    pub archives: usize,
    pub resident_archives: usize,
    pub resident_bytes: u64,
    /// Current budget for resident bytes, if any.
    pub memory_limit: Option<u64>,
    /// Distinct name hashes in the global index.
    pub indexed_assets: usize,
    /// Archives that failed to load at construction.
    pub failed: usize,
}

/// A set of pack2 archives behind one name index.
///
/// Every archive is read and indexed at construction. Archive buffers may
/// later be unloaded to stay within the memory budget and are paged back in
/// on demand. Archives with live [`AssetLease`]s are never unloaded.
///
/// # Example
///
/// ```no_run
/// use forgepack_manager::Manager;
///
/// let manager = Manager::new(["assets_x64_0.pack2", "assets_x64_1.pack2"]);
/// let asset = manager.get("Amerish.zone")?;
/// println!("{} bytes", asset.data()?.len());
/// # Ok::<(), forgepack_manager::Error>(())
/// ```
pub struct Manager {
    archives: Vec<ArchiveSlot>,
    index: FxHashMap<u64, usize>,
    config: ManagerConfig,
    budget: MemoryBudget,
    transition: Mutex<()>,
}

impl Manager {
    /// Load archives with the default configuration.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_config(paths, ManagerConfig::default())
    }

    /// Load archives in parallel and merge their indices.
    ///
    /// Archive ids follow the order of `paths`. When two archives contain the
    /// same hash the later path wins; callers should not rely on this.
    pub fn with_config<I, P>(paths: I, config: ManagerConfig) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let budget = MemoryBudget::new(config.memory_limit);

        let archives: Vec<ArchiveSlot> = paths
            .into_par_iter()
            .map(|path| ArchiveSlot::open(path, &budget))
            .collect();

        let mut index = FxHashMap::default();
        for (id, slot) in archives.iter().enumerate() {
            let Some(pack) = slot.pack() else { continue };
            debug!(archive = id, assets = pack.asset_count(), "merging {}", slot.name());
            for hash in pack.hashes() {
                index.insert(hash, id);
            }
        }

        let failed = archives.iter().filter(|slot| slot.load_error().is_some()).count();
        info!(
            archives = archives.len(),
            failed,
            assets = index.len(),
            resident = %human_bytes(budget.resident()),
            "loaded archives"
        );

        Self {
            archives,
            index,
            config,
            budget,
            transition: Mutex::new(()),
        }
    }

    /// Load every archive matching a glob pattern, in sorted path order.
    pub fn open_glob(pattern: &str, config: ManagerConfig) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(path) => paths.push(path),
                Err(e) => warn!("skipping unreadable glob match: {e}"),
            }
        }
        paths.sort();
        Ok(Self::with_config(paths, config))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Change the memory budget. Takes effect on the next page-in; nothing
    /// is evicted right away.
    pub fn set_memory_limit(&self, limit: Option<u64>) {
        self.budget.set_limit(limit);
    }

    #[inline]
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    pub fn archive_path(&self, id: usize) -> Option<&Path> {
        self.archives.get(id).map(ArchiveSlot::path)
    }

    /// File name of an archive.
    pub fn archive_name(&self, id: usize) -> Option<String> {
        self.archives.get(id).map(ArchiveSlot::name)
    }

    pub fn is_resident(&self, id: usize) -> bool {
        self.archives
            .get(id)
            .is_some_and(|slot| slot.resident.read().is_some())
    }

    /// Archives that failed to load at construction.
    pub fn load_errors(&self) -> impl Iterator<Item = (usize, &Path, &Error)> {
        self.archives
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.load_error().map(|e| (id, slot.path(), e)))
    }

    /// Whether any loaded archive holds `name`.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&hash_name(name))
    }

    #[inline]
    pub fn contains_hash(&self, hash: u64) -> bool {
        self.index.contains_key(&hash)
    }

    /// Id of the archive the index resolves `hash` to.
    #[inline]
    pub fn archive_of(&self, hash: u64) -> Option<usize> {
        self.index.get(&hash).copied()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            archives: self.archives.len(),
            resident_archives: (0..self.archives.len())
                .filter(|&id| self.is_resident(id))
                .count(),
            resident_bytes: self.budget.resident(),
            memory_limit: self.budget.limit(),
            indexed_assets: self.index.len(),
            failed: self.load_errors().count(),
        }
    }

    /// Look up an asset by name, paging its archive in if needed.
    pub fn get(&self, name: &str) -> Result<AssetLease> {
        let hash = hash_name(name);
        let id = self
            .archive_of(hash)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        self.lease(id, hash, Some(name))
    }

    /// Look up an asset by name hash.
    pub fn get_hash(&self, hash: u64) -> Result<AssetLease> {
        let id = self.archive_of(hash).ok_or(Error::HashNotFound(hash))?;
        self.lease(id, hash, None)
    }

    /// Table record for `name`, without decoding.
    ///
    /// `None` if the name is unknown or its archive cannot be loaded.
    pub fn get_raw(&self, name: &str) -> Option<AssetRecord> {
        let hash = hash_name(name);
        let id = self.archive_of(hash)?;
        let slot = &self.archives[id];
        let pack = slot.pack()?;

        let resident = match self.resident_guard(id) {
            Ok(guard) => guard,
            Err(e) => {
                debug!("{name}: {e}");
                return None;
            }
        };
        let buffer = &resident.as_ref()?.buffer;
        pack.lookup_hash(buffer, hash).ok()
    }

    /// Snapshot of an archive's table in on-disk order.
    pub fn records(&self, id: usize) -> Result<Vec<AssetRecord>> {
        let slot = self.slot(id)?;
        let pack = slot.available()?;
        let resident = self.resident_guard(id)?;
        let Some(resident) = resident.as_ref() else {
            return Err(self.exhausted(slot, 0));
        };

        let table = pack
            .table(&resident.buffer)
            .map_err(|source| slot.pack_error(source))?;
        Ok(table.iter().collect())
    }

    /// Names from every `{NAMELIST}` asset in the loaded archives.
    ///
    /// Archives whose list cannot be read are skipped with a warning.
    pub fn namelist(&self) -> Namelist {
        let hash = hash_name(NAMELIST_NAME);
        let mut names = Namelist::new();

        for (id, slot) in self.archives.iter().enumerate() {
            if !slot.pack().is_some_and(|pack| pack.contains_hash(hash)) {
                continue;
            }
            let list = self
                .lease(id, hash, Some(NAMELIST_NAME))
                .and_then(|lease| Ok(Namelist::parse(lease.data()?)));
            match list {
                Ok(list) => {
                    debug!(archive = id, names = list.len(), "read namelist");
                    names.merge(list);
                }
                Err(e) => warn!("{}: cannot read namelist: {e}", slot.name()),
            }
        }

        names
    }

    /// Unload resident archives until at least `target` bytes are freed.
    ///
    /// Archives are visited in id order and unloaded only if no lease on them
    /// is alive. Returns the bytes freed, which may fall short of `target`.
    pub fn evict(&self, target: u64) -> u64 {
        let transition = self.transition.lock();
        self.evict_locked(&transition, target, None)
    }

    /// Unload one archive if it is resident and unused. Returns bytes freed.
    pub fn unload(&self, id: usize) -> Result<u64> {
        let slot = self.slot(id)?;
        let _transition = self.transition.lock();
        Ok(self.unload_slot(slot))
    }

    /// Write every resident asset whose bytes start with `signature` to
    /// `directory/<decimal name hash><extension>`.
    ///
    /// Archives are scanned in parallel. A failure on one asset is counted
    /// and logged; the scan carries on.
    pub fn export_by_magic(
        &self,
        signature: &[u8],
        directory: impl AsRef<Path>,
        extension: &str,
    ) -> Result<ExportStats> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory).map_err(|source| Error::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let extension = normalize_extension(extension);

        // Pin resident archives so they cannot be unloaded mid-scan.
        let pinned: Vec<(usize, Bytes, LeaseGuard)> = self
            .archives
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| {
                let resident = slot.resident.read();
                let buffer = resident.as_ref()?.buffer.clone();
                Some((id, buffer, LeaseGuard::new(&slot.leases)))
            })
            .collect();

        let scanned = AtomicU64::new(0);
        let matched = AtomicU64::new(0);
        let written = AtomicU64::new(0);
        let errors = AtomicU64::new(0);
        let writer = Mutex::new(());

        pinned.par_iter().for_each(|(id, buffer, _pin)| {
            let slot = &self.archives[*id];
            let Some(pack) = slot.pack() else { return };
            let table = match pack.table(buffer) {
                Ok(table) => table,
                Err(e) => {
                    warn!("{}: cannot read table: {e}", slot.name());
                    errors.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            for record in table.iter().filter(|record| record.data_length > 0) {
                scanned.fetch_add(1, Ordering::Relaxed);

                let asset = match Asset::from_buffer(record, None, buffer) {
                    Ok(asset) => asset,
                    Err(e) => {
                        warn!("{}: {:#018x}: {e}", slot.name(), record.name_hash);
                        errors.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };
                let data = match asset.data() {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("{}: {:#018x}: {e}", slot.name(), record.name_hash);
                        errors.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };
                if !data.starts_with(signature) {
                    continue;
                }
                matched.fetch_add(1, Ordering::Relaxed);

                let path = directory.join(export_file_name(record.name_hash, &extension));
                trace!(path = %path.display(), len = data.len(), "exporting");
                let result = {
                    let _write = writer.lock();
                    fs::write(&path, data)
                };
                match result {
                    Ok(()) => {
                        written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("cannot write {}: {e}", path.display());
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        let stats = ExportStats {
            archives: pinned.len(),
            scanned: scanned.into_inner(),
            matched: matched.into_inner(),
            written: written.into_inner(),
            errors: errors.into_inner(),
        };
        info!(
            archives = stats.archives,
            matched = stats.matched,
            written = stats.written,
            errors = stats.errors,
            "export finished"
        );
        Ok(stats)
    }

    fn slot(&self, id: usize) -> Result<&ArchiveSlot> {
        self.archives.get(id).ok_or(Error::InvalidArchiveId(id))
    }

    /// Lease the cached handle for `hash` in archive `id`.
    ///
    /// The lease is taken while the read guard is held, so the archive cannot
    /// be unloaded between the residency check and the lease.
    fn lease(&self, id: usize, hash: u64, name: Option<&str>) -> Result<AssetLease> {
        let slot = self.slot(id)?;
        slot.available()?;

        let resident = self.resident_guard(id)?;
        let Some(current) = resident.as_ref() else {
            return Err(self.exhausted(slot, 0));
        };
        let asset = slot.handle(current, hash, name)?;
        Ok(AssetLease::new(asset, id, &slot.leases))
    }

    /// Read guard over a resident archive, paging it in if needed.
    fn resident_guard(&self, id: usize) -> Result<RwLockReadGuard<'_, Option<Resident>>> {
        let slot = self.slot(id)?;
        {
            let resident = slot.resident.read();
            if resident.is_some() {
                return Ok(resident);
            }
        }
        self.page_in(id, slot)
    }

    fn page_in<'a>(
        &'a self,
        id: usize,
        slot: &'a ArchiveSlot,
    ) -> Result<RwLockReadGuard<'a, Option<Resident>>> {
        let transition = self.transition.lock();
        let mut resident = slot.resident.write();

        if resident.is_none() {
            let buffer = self.load_with_eviction(&transition, id, slot)?;
            let len = buffer.len() as u64;
            *resident = Some(Resident {
                buffer,
                generation: slot.next_generation(),
            });
            info!(archive = id, "paged in {} ({})", slot.name(), human_bytes(len));
        }

        Ok(RwLockWriteGuard::downgrade(resident))
    }

    /// Read an archive back in, evicting others when the budget or the
    /// allocator refuses, up to the configured number of attempts.
    fn load_with_eviction(
        &self,
        transition: &MutexGuard<'_, ()>,
        id: usize,
        slot: &ArchiveSlot,
    ) -> Result<Bytes> {
        let pack = slot.available()?;
        let attempts = self.config.max_load_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            let wanted = match slot.reload(&self.budget) {
                Ok(buffer) => {
                    if let Err(source) = pack.table(&buffer) {
                        self.budget.release(buffer.len() as u64);
                        return Err(slot.pack_error(source));
                    }
                    return Ok(buffer);
                }
                Err(LoadFailure::Io(source)) => return Err(slot.io_error(source)),
                Err(failure @ LoadFailure::Budget { shortfall, .. }) => {
                    last = Some(failure);
                    shortfall
                }
                Err(failure @ LoadFailure::Alloc { needed }) => {
                    last = Some(failure);
                    needed
                }
            };

            if attempt < attempts {
                let freed = self.evict_locked(transition, wanted, Some(id));
                debug!(archive = id, attempt, wanted, freed, "evicted to make room");
            }
        }

        Err(match last {
            Some(failure) => slot.failure_error(failure, attempts),
            None => self.exhausted(slot, attempts),
        })
    }

    /// Caller must hold the transition lock.
    fn evict_locked(
        &self,
        _transition: &MutexGuard<'_, ()>,
        target: u64,
        skip: Option<usize>,
    ) -> u64 {
        let mut freed = 0;
        for (id, slot) in self.archives.iter().enumerate() {
            if freed >= target {
                break;
            }
            if Some(id) == skip {
                continue;
            }
            freed += self.unload_slot(slot);
        }
        freed
    }

    /// Caller must hold the transition lock.
    fn unload_slot(&self, slot: &ArchiveSlot) -> u64 {
        let mut resident = slot.resident.write();
        if resident.is_none() {
            return 0;
        }
        if slot.leases.count() > 0 {
            trace!("{} is in use", slot.name());
            return 0;
        }

        let Some(unloaded) = resident.take() else {
            return 0;
        };
        slot.clear_handles();

        let len = unloaded.buffer.len() as u64;
        self.budget.release(len);
        info!("unloaded {} ({})", slot.name(), human_bytes(len));
        len
    }

    fn exhausted(&self, slot: &ArchiveSlot, attempts: u32) -> Error {
        Error::ResourceExhausted {
            path: slot.path().to_path_buf(),
            needed: 0,
            attempts,
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("archives", &self.archives.len())
            .field("assets", &self.index.len())
            .field("config", &self.config)
            .finish()
    }
}
