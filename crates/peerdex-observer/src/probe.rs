//! Host probe backed by `sysinfo` and `walkdir`.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use peerdex_core::traits::SystemProbe;
use peerdex_core::ServiceResult;
use sysinfo::{Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ProbeError, ProbeResult};

/// Reads free space, directory sizes and free memory from the host.
///
/// Calls block; the observer runs them on the blocking thread pool.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let refresh = RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram());
        Self {
            system: Mutex::new(System::new_with_specifics(refresh)),
        }
    }

    /// Available bytes on the filesystem holding `path`.
    pub fn available_space(&self, path: &Path) -> ProbeResult<u64> {
        let target = existing_ancestor(path)?;
        let disks = Disks::new_with_refreshed_list();
        let available = disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space());
        available.ok_or(ProbeError::NoFilesystem(target))
    }

    /// Total size of the regular files below `path`.
    ///
    /// Entries that vanish or cannot be read during the walk are skipped.
    pub fn tree_size(&self, path: &Path) -> ProbeResult<u64> {
        let root = std::fs::metadata(path)?;
        if root.is_file() {
            return Ok(root.len());
        }

        let mut total = 0u64;
        for entry in WalkDir::new(path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(ProbeError::Walk {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => total = total.saturating_add(meta.len()),
                Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping entry"),
            }
        }
        Ok(total)
    }

    pub fn available_memory(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.available_memory()
    }
}

/// The closest existing directory, so a data dir that is not created yet
/// still resolves to its filesystem.
fn existing_ancestor(path: &Path) -> ProbeResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    for candidate in absolute.ancestors() {
        if let Ok(resolved) = candidate.canonicalize() {
            return Ok(resolved);
        }
    }
    Err(ProbeError::NoFilesystem(absolute))
}

impl SystemProbe for SysinfoProbe {
    fn disk_free(&self, path: &Path) -> ServiceResult<u64> {
        Ok(self.available_space(path)?)
    }

    fn dir_size(&self, path: &Path) -> ServiceResult<u64> {
        Ok(self.tree_size(path)?)
    }

    fn memory_free(&self) -> ServiceResult<u64> {
        Ok(self.available_memory())
    }
}
