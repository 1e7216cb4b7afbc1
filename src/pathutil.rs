//! Path simplification and the `PathService` file-identity abstraction
//! (spec.md §9 design note): one trait, two platform implementations,
//! used by the include resolver (component I) to collapse aliased paths
//! (symlinks, hard links, `../` detours) to the same cache key.

use std::path::{Component, Path, PathBuf};

/// Lexically simplifies a path: drops `.` segments, resolves `..` against
/// a preceding real segment, and normalizes separators. Does not touch the
/// filesystem — that's `PathService::identity`'s job.
pub fn simplify_path(path: &str) -> String {
    let mut out: Vec<Component> = Vec::new();
    let p = Path::new(path);
    let is_absolute = p.is_absolute();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !is_absolute {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    let mut buf = PathBuf::new();
    for comp in out {
        buf.push(comp.as_os_str());
    }
    if buf.as_os_str().is_empty() {
        ".".to_string()
    } else {
        buf.to_string_lossy().replace('\\', "/")
    }
}

/// Opaque, comparable file identity — two paths that name the same file on
/// disk (symlink, hardlink, `..`-detour) produce equal identities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FileIdentity(u64, u64);

pub trait PathService {
    fn identity(&self, path: &Path) -> std::io::Result<FileIdentity>;
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(unix)]
pub struct UnixPathService;

#[cfg(unix)]
impl PathService for UnixPathService {
    fn identity(&self, path: &Path) -> std::io::Result<FileIdentity> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        Ok(FileIdentity(meta.dev(), meta.ino()))
    }
}

#[cfg(windows)]
pub struct WindowsPathService;

#[cfg(windows)]
impl PathService for WindowsPathService {
    fn identity(&self, path: &Path) -> std::io::Result<FileIdentity> {
        use std::os::windows::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        // `volume_serial_number`/`file_index` require opening the file with
        // backup semantics in the general case; `std`'s `MetadataExt` only
        // exposes `file_size`/attributes portably, so fall back to a path
        // string's hash as the identity on this platform — good enough to
        // dedupe repeated `#include` of the exact same spelling, which is
        // the common case, while symlink/junction aliasing is not collapsed.
        let _ = meta;
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        Ok(FileIdentity(hasher.finish(), 0))
    }
}

#[cfg(unix)]
pub fn default_path_service() -> UnixPathService {
    UnixPathService
}

#[cfg(windows)]
pub fn default_path_service() -> WindowsPathService {
    WindowsPathService
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_dot_and_dotdot() {
        assert_eq!(simplify_path("a/./b/../c"), "a/c");
        assert_eq!(simplify_path("./a/b"), "a/b");
        assert_eq!(simplify_path("a/../../b"), "../b");
    }
}
