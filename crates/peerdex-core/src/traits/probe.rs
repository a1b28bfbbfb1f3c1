use std::path::Path;

use crate::error::ServiceResult;

/// OS-level resource readings, in bytes.
///
/// Calls may block (a directory walk in particular), so async callers run
/// them on the blocking pool.
pub trait SystemProbe: Send + Sync {
    fn disk_free(&self, path: &Path) -> ServiceResult<u64>;

    /// Total size of all files below `path`.
    fn dir_size(&self, path: &Path) -> ServiceResult<u64>;

    fn memory_free(&self) -> ServiceResult<u64>;
}
