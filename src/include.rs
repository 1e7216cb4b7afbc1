//! Component I — Include Resolver: `#include` search order, path
//! simplification, and a negative cache for headers already known missing.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::pathutil::simplify_path;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IncludeKind {
    Quoted,
    Angle,
}

/// Resolves `#include` targets against the directory of the including file
/// plus a fixed list of search directories, the way a C compiler's `-I`
/// flags do. Shareable across `Engine` invocations (spec.md §5) by keeping
/// one `IncludeResolver` alive and passing it to each run.
pub struct IncludeResolver {
    search_dirs: Vec<PathBuf>,
    negative_cache: RefCell<HashSet<String>>,
}

impl IncludeResolver {
    pub fn new(search_dirs: Vec<PathBuf>) -> IncludeResolver {
        IncludeResolver { search_dirs, negative_cache: RefCell::new(HashSet::new()) }
    }

    /// Resolves `header` as seen from `including_file`. A quoted include
    /// (`"foo.h"`) first tries the including file's own directory, then
    /// falls through to the same search-dir list an angle include uses;
    /// an angle include (`<foo.h>`) never consults the including file's
    /// directory.
    pub fn resolve(&self, including_file: &Path, header: &str, kind: IncludeKind) -> Option<PathBuf> {
        if Path::new(header).is_absolute() {
            return self.try_path(Path::new(header));
        }

        let cache_key = format!("{}\u{0}{}\u{0}{:?}", including_file.display(), header, kind);
        if self.negative_cache.borrow().contains(&cache_key) {
            return None;
        }

        if kind == IncludeKind::Quoted {
            if let Some(dir) = including_file.parent() {
                if let Some(found) = self.try_path(&dir.join(header)) {
                    return Some(found);
                }
            }
        }

        for dir in &self.search_dirs {
            if let Some(found) = self.try_path(&dir.join(header)) {
                return Some(found);
            }
        }

        self.negative_cache.borrow_mut().insert(cache_key);
        None
    }

    pub fn has_include(&self, including_file: &Path, header: &str, kind: IncludeKind) -> bool {
        self.resolve(including_file, header, kind).is_some()
    }

    /// Drops the known-missing cache, per `Dui::clear_include_cache`.
    pub fn clear_negative_cache(&self) {
        self.negative_cache.borrow_mut().clear();
    }

    fn try_path(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_file() {
            let simplified = simplify_path(&candidate.to_string_lossy());
            Some(PathBuf::from(simplified))
        } else {
            None
        }
    }
}
