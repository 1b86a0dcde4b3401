use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use walkdir::WalkDir;

/// Resource lookup by logical name. Names are matched case-insensitively;
/// whatever decompression the backing store needs happens behind this call.
pub trait ResourceSource {
    fn open(&self, name: &str) -> Result<Vec<u8>>;

    fn contains(&self, name: &str) -> bool;
}

fn resource_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Serves resources from an extracted data directory, indexed by file name.
#[derive(Debug, Default, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    index: HashMap<String, PathBuf>,
}

impl DirectorySource {
    pub fn from_root<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }

        let mut index = HashMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("traversing data directory {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            index
                .entry(resource_key(name))
                .or_insert_with(|| entry.path().to_path_buf());
        }

        Ok(DirectorySource {
            root: root.to_path_buf(),
            index,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl ResourceSource for DirectorySource {
    fn open(&self, name: &str) -> Result<Vec<u8>> {
        let path = self
            .index
            .get(&resource_key(name))
            .ok_or_else(|| anyhow!("resource {name} not found under {}", self.root.display()))?;
        fs::read(path).with_context(|| format!("reading {}", path.display()))
    }

    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&resource_key(name))
    }
}

/// In-memory resource table, used for embedded data and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(resource_key(name), bytes.into());
    }

    pub fn with(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl ResourceSource for MemorySource {
    fn open(&self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .get(&resource_key(name))
            .cloned()
            .ok_or_else(|| anyhow!("resource {name} not found"))
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&resource_key(name))
    }
}
