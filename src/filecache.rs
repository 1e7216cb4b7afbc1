//! Component J — File Data Cache: tokenized file contents keyed by path,
//! with a secondary file-identity index so two spellings of the same file
//! (symlink, `../` detour) share one entry.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::pathutil::{FileIdentity, PathService};
use crate::tokenlist::TokenList;

pub struct FileData {
    pub filename: String,
    pub tokens: TokenList,
}

#[derive(Default)]
pub struct FileDataCache {
    by_path: HashMap<String, Rc<FileData>>,
    by_identity: HashMap<FileIdentity, String>,
}

impl FileDataCache {
    pub fn new() -> FileDataCache {
        FileDataCache::default()
    }

    pub fn get(&self, path: &str) -> Option<Rc<FileData>> {
        self.by_path.get(path).cloned()
    }

    /// Looks a path up by file identity first (catching symlink/hardlink
    /// aliases and `../` detours that resolve to an already-cached file)
    /// before falling back to an exact path match.
    pub fn get_by_identity(&self, path_service: &dyn PathService, path: &Path) -> Option<Rc<FileData>> {
        if let Ok(id) = path_service.identity(path) {
            if let Some(canonical) = self.by_identity.get(&id) {
                return self.by_path.get(canonical).cloned();
            }
        }
        self.get(&path.to_string_lossy())
    }

    pub fn insert(&mut self, path: String, data: FileData, identity: Option<FileIdentity>) {
        if let Some(id) = identity {
            self.by_identity.entry(id).or_insert_with(|| path.clone());
        }
        self.by_path.insert(path, Rc::new(data));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }
}
