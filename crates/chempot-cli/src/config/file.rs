use crate::error::{CliError, Result};
use chempot::engine::cache::CachePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileCachePolicy {
    Reuse,
    RefreshIfStale,
    Rebuild,
}

impl From<FileCachePolicy> for CachePolicy {
    fn from(p: FileCachePolicy) -> Self {
        match p {
            FileCachePolicy::Reuse => CachePolicy::Reuse,
            FileCachePolicy::RefreshIfStale => CachePolicy::RefreshIfStale,
            FileCachePolicy::Rebuild => CachePolicy::Rebuild,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSourceConfig {
    pub table: Option<PathBuf>,
    pub calculations: Option<PathBuf>,
    pub strict: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCacheConfig {
    pub path: Option<PathBuf>,
    pub policy: Option<FileCachePolicy>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOutputConfig {
    pub limits: Option<PathBuf>,
    pub absolute: Option<bool>,
    pub cplap: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGridConfig {
    pub points: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub target: Option<String>,
    pub elements: Option<Vec<String>>,
    pub dependent_element: Option<String>,
    pub extrinsic: Option<Vec<String>>,
    pub tolerance: Option<f64>,
    pub source: Option<FileSourceConfig>,
    pub cache: Option<FileCacheConfig>,
    pub output: Option<FileOutputConfig>,
    pub grid: Option<FileGridConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.resolve_relative_paths(path.parent().unwrap_or(Path::new("")));
        Ok(config)
    }

    /// Paths in a config file are relative to the file, not to the working
    /// directory.
    fn resolve_relative_paths(&mut self, base: &Path) {
        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut().filter(|path| path.is_relative()) {
                *path = base.join(&*path);
            }
        };
        if let Some(source) = self.source.as_mut() {
            resolve(&mut source.table);
            resolve(&mut source.calculations);
        }
        if let Some(cache) = self.cache.as_mut() {
            resolve(&mut cache.path);
        }
        if let Some(output) = self.output.as_mut() {
            resolve(&mut output.limits);
            resolve(&mut output.cplap);
        }
    }
}
