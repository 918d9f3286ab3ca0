use chempot::engine::cache::CachePolicy;
use chempot::engine::config::DEFAULT_TOLERANCE;

pub struct DefaultsConfig {
    pub tolerance: f64,
    pub cache_policy: CachePolicy,
    pub grid_points: usize,
    pub cplap_file: &'static str,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            cache_policy: CachePolicy::RefreshIfStale,
            grid_points: 20,
            cplap_file: "input.dat",
        }
    }
}
