use super::defaults::DefaultsConfig;
use super::file::{FileCachePolicy, FileConfig, FileSourceConfig};
use super::models::{AppConfig, OutputConfig};
use crate::cli::SolveArgs;
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParseError};
use chempot::engine::cache::CachePolicy;
use chempot::engine::config as core_config;
use tracing::debug;

/// Merges the command line, `-S` overrides, the config file and defaults.
///
/// `output` and `grid_points` carry the command-specific flags; they win over
/// the `[output]` and `[grid]` sections of the file.
pub fn build_config(
    args: &SolveArgs,
    output: &OutputConfig,
    grid_points: Option<usize>,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let target = args.target.clone().or(file_config.target.take());
    let tolerance = args
        .tolerance
        .or(file_config.tolerance)
        .unwrap_or(defaults.tolerance);
    let extrinsic = args
        .extrinsic
        .clone()
        .or(file_config.extrinsic.take())
        .unwrap_or_default();
    let dependent_element = args
        .dependent_element
        .clone()
        .or(file_config.dependent_element.take());

    let source = merge_source(args, file_config.source.take().unwrap_or_default())?;
    let cache = merge_cache(args, &mut file_config, &defaults);

    let mut builder = core_config::LimitsConfigBuilder::new()
        .dependent_element(dependent_element)
        .extrinsic(extrinsic)
        .tolerance(tolerance)
        .cache(cache);
    if let Some(target) = target {
        builder = builder.target(target);
    }
    if let Some(elements) = args.elements.clone().or(file_config.elements.take()) {
        builder = builder.elements(elements);
    }
    if let Some(source) = source {
        builder = builder.source(source);
    }
    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let output_file = file_config.output.take().unwrap_or_default();
    let output = OutputConfig {
        limits: output.limits.clone().or(output_file.limits),
        absolute: output.absolute || output_file.absolute.unwrap_or(false),
        cplap: output.cplap.clone().or(output_file.cplap),
    };

    let grid_points = grid_points
        .or(file_config.grid.and_then(|g| g.points))
        .unwrap_or(defaults.grid_points);
    if grid_points == 0 {
        return Err(CliError::Config(
            "The number of grid points must be at least 1".to_string(),
        ));
    }

    debug!("Resolved configuration: {:?}", core_config);
    Ok(AppConfig {
        core_config,
        output,
        grid_points,
    })
}

fn merge_source(
    args: &SolveArgs,
    file_source: FileSourceConfig,
) -> Result<Option<core_config::PhaseSourceConfig>> {
    let strict = args.source.strict || file_source.strict.unwrap_or(false);

    if let Some(table) = &args.source.table {
        return Ok(Some(core_config::PhaseSourceConfig::Table(table.clone())));
    }
    if let Some(root) = &args.source.calculations {
        return Ok(Some(core_config::PhaseSourceConfig::Calculations {
            root: root.clone(),
            strict,
        }));
    }
    match (file_source.table, file_source.calculations) {
        (Some(_), Some(_)) => Err(CliError::Config(
            "`[source]` accepts either `table` or `calculations`, not both".to_string(),
        )),
        (Some(table), None) => Ok(Some(core_config::PhaseSourceConfig::Table(table))),
        (None, Some(root)) => Ok(Some(core_config::PhaseSourceConfig::Calculations {
            root,
            strict,
        })),
        (None, None) => Ok(None),
    }
}

fn merge_cache(
    args: &SolveArgs,
    file_config: &mut FileConfig,
    defaults: &DefaultsConfig,
) -> Option<core_config::CacheConfig> {
    let cache_file = file_config.cache.take().unwrap_or_default();
    let path = args.source.cache.clone().or(cache_file.path)?;
    let policy = if args.source.rebuild_cache {
        CachePolicy::Rebuild
    } else {
        cache_file
            .policy
            .map(CachePolicy::from)
            .unwrap_or(defaults.cache_policy)
    };
    Some(core_config::CacheConfig { path, policy })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) = parser::parse_key_value(kv_pair).map_err(config_error)?;

        match key {
            "target" => config.target = Some(value.to_string()),
            "elements" => config.elements = Some(parser::parse_list(value)),
            "dependent-element" => config.dependent_element = Some(value.to_string()),
            "extrinsic" => config.extrinsic = Some(parser::parse_list(value)),
            "tolerance" => {
                config.tolerance =
                    Some(parser::parse_value(key, value, "float").map_err(config_error)?)
            }
            "source.table" => {
                let source = config.source.get_or_insert_with(Default::default);
                source.table = Some(value.into());
                source.calculations = None;
            }
            "source.calculations" => {
                let source = config.source.get_or_insert_with(Default::default);
                source.calculations = Some(value.into());
                source.table = None;
            }
            "source.strict" => {
                config.source.get_or_insert_with(Default::default).strict =
                    Some(parser::parse_value(key, value, "boolean").map_err(config_error)?)
            }
            "cache.path" => {
                config.cache.get_or_insert_with(Default::default).path = Some(value.into())
            }
            "cache.policy" => {
                config.cache.get_or_insert_with(Default::default).policy =
                    Some(parse_cache_policy(key, value)?)
            }
            "output.limits" => {
                config.output.get_or_insert_with(Default::default).limits = Some(value.into())
            }
            "output.absolute" => {
                config.output.get_or_insert_with(Default::default).absolute =
                    Some(parser::parse_value(key, value, "boolean").map_err(config_error)?)
            }
            "output.cplap" => {
                config.output.get_or_insert_with(Default::default).cplap = Some(value.into())
            }
            "grid.points" => {
                config.grid.get_or_insert_with(Default::default).points =
                    Some(parser::parse_value(key, value, "integer").map_err(config_error)?)
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

fn parse_cache_policy(key: &str, value: &str) -> Result<FileCachePolicy> {
    match value {
        "reuse" => Ok(FileCachePolicy::Reuse),
        "refresh-if-stale" => Ok(FileCachePolicy::RefreshIfStale),
        "rebuild" => Ok(FileCachePolicy::Rebuild),
        _ => Err(config_error(ParseError::InvalidValue {
            key: key.to_string(),
            kind: "cache policy",
            value: value.to_string(),
        })),
    }
}

fn config_error(e: ParseError) -> CliError {
    CliError::Config(e.to_string())
}
