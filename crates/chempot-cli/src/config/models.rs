use chempot::engine::config as core_config;
use std::path::PathBuf;

/// Where a command writes its results, beyond what it prints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputConfig {
    pub limits: Option<PathBuf>,
    pub absolute: bool,
    pub cplap: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub core_config: core_config::LimitsConfig,
    pub output: OutputConfig,
    pub grid_points: usize,
}
