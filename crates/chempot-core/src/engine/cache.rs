use super::error::EngineError;
use crate::core::io::table::PhaseTableFile;
use crate::core::io::traits::TableFile;
use crate::core::models::phase::PhaseTable;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// When a cached phase table may be used instead of re-ingesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Use the cache whenever it exists.
    Reuse,
    /// Use the cache unless any source file is newer than it, or the set of
    /// source files changed since it was written.
    #[default]
    RefreshIfStale,
    /// Always rebuild and overwrite the cache.
    Rebuild,
}

/// A phase table persisted at a caller-chosen path, with the list of source
/// files it was built from in a `.sources` file next to it.
///
/// Concurrent writers to the same path are not coordinated.
#[derive(Debug, Clone)]
pub struct PhaseTableCache {
    path: PathBuf,
    policy: CachePolicy,
}

impl PhaseTableCache {
    pub fn new(path: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Path of the source manifest, e.g. `phases.csv.sources`.
    pub fn manifest_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".sources");
        PathBuf::from(name)
    }

    /// Whether any of `sources` was modified after the cache was written, or
    /// a source was added or removed since. A missing cache or manifest is
    /// stale; unreadable source timestamps are ignored.
    pub fn is_stale(&self, sources: &[PathBuf]) -> bool {
        let Some(cached_at) = modified(&self.path) else {
            return true;
        };
        match self.read_manifest() {
            Some(recorded) if recorded == sources.iter().cloned().collect::<BTreeSet<_>>() => {}
            Some(_) => {
                debug!("Source files of {} changed.", self.path.display());
                return true;
            }
            None => return true,
        }
        sources
            .iter()
            .filter_map(|source| modified(source))
            .any(|source_time| source_time > cached_at)
    }

    /// Returns the cached table if the policy allows it.
    pub fn load(&self, sources: &[PathBuf]) -> Result<Option<PhaseTable>, EngineError> {
        let usable = match self.policy {
            CachePolicy::Reuse => self.path.exists(),
            CachePolicy::RefreshIfStale => !self.is_stale(sources),
            CachePolicy::Rebuild => false,
        };
        if !usable {
            debug!("Phase table cache at {} is not usable.", self.path.display());
            return Ok(None);
        }
        let table = PhaseTableFile::read_from_path(&self.path)?;
        info!(
            "Loaded {} phase(s) from cache {}.",
            table.len(),
            self.path.display()
        );
        Ok(Some(table))
    }

    /// Writes the table and the manifest of `sources` it was built from.
    pub fn store(&self, table: &PhaseTable, sources: &[PathBuf]) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| EngineError::Cache {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        PhaseTableFile::write_to_path(table, &self.path)?;
        let manifest: String = sources
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|source| format!("{}\n", source.display()))
            .collect();
        let manifest_path = self.manifest_path();
        fs::write(&manifest_path, manifest).map_err(|source| EngineError::Cache {
            path: manifest_path,
            source,
        })?;
        debug!("Wrote {} phase(s) to cache {}.", table.len(), self.path.display());
        Ok(())
    }

    /// Loads the cache, or builds the table with `build` and stores it.
    pub fn load_or_build<F>(&self, sources: &[PathBuf], build: F) -> Result<PhaseTable, EngineError>
    where
        F: FnOnce() -> Result<PhaseTable, EngineError>,
    {
        if let Some(table) = self.load(sources)? {
            return Ok(table);
        }
        let table = build()?;
        self.store(&table, sources)?;
        Ok(table)
    }

    /// Deletes the cache file and its manifest. Missing files are not an
    /// error.
    pub fn invalidate(&self) -> Result<(), EngineError> {
        for path in [self.path.clone(), self.manifest_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(EngineError::Cache { path, source }),
            }
        }
        info!("Invalidated phase table cache {}.", self.path.display());
        Ok(())
    }

    fn read_manifest(&self) -> Option<BTreeSet<PathBuf>> {
        let contents = fs::read_to_string(self.manifest_path()).ok()?;
        Some(
            contents
                .lines()
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
        )
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
