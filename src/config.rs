use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine configuration. Every field has a documented default; a config
/// file is optional — [`Config::default`] reproduces every default, so
/// the binary runs with zero external files, loading overrides from an
/// optional YAML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    /// Bind address for the REST boundary, e.g. `127.0.0.1:3000`.
    #[serde(default = "Config::default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cors_permissive: bool,
}

impl Config {
    fn default_bind_addr() -> String {
        "127.0.0.1:3000".to_string()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Loads from `path` if present, otherwise falls back to
    /// [`Config::default`] — the engine never refuses to start for want of
    /// a config file.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        if path.as_ref().exists() {
            match Self::load(&path) {
                Ok(cfg) => return cfg,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to parse config file, using defaults");
                }
            }
        }
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            motion: MotionConfig::default(),
            matcher: MatcherConfig::default(),
            adapter: AdapterConfig::default(),
            route: RouteConfig::default(),
            advisor: AdvisorConfig::default(),
            events: EventsConfig::default(),
            observer: ObserverConfig::default(),
            predictor: PredictorConfig::default(),
            bind_addr: Config::default_bind_addr(),
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    #[serde(default = "TickConfig::default_motion_period_s")]
    pub period_motion_s: u64,
    #[serde(default = "TickConfig::default_observer_period_s")]
    pub period_observer_s: u64,
    #[serde(default = "TickConfig::default_matcher_period_s")]
    pub period_matcher_s: u64,
    #[serde(default = "TickConfig::default_adapter_period_s")]
    pub period_adapter_s: u64,
}

impl TickConfig {
    fn default_motion_period_s() -> u64 {
        3
    }
    fn default_observer_period_s() -> u64 {
        10
    }
    fn default_matcher_period_s() -> u64 {
        30
    }
    fn default_adapter_period_s() -> u64 {
        30
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period_motion_s: Self::default_motion_period_s(),
            period_observer_s: Self::default_observer_period_s(),
            period_matcher_s: Self::default_matcher_period_s(),
            period_adapter_s: Self::default_adapter_period_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "MotionConfig::default_speed_kmh")]
    pub speed_kmh: f64,
    #[serde(default = "MotionConfig::default_fuel_loaded_pct_per_10km")]
    pub fuel_loaded_pct_per_10km: f64,
    #[serde(default = "MotionConfig::default_fuel_empty_pct_per_10km")]
    pub fuel_empty_pct_per_10km: f64,
    #[serde(default = "MotionConfig::default_position_event_every_n_ticks")]
    pub position_event_every_n_ticks: u32,
    #[serde(default = "MotionConfig::default_idle_timeout_minutes")]
    pub idle_timeout_minutes: f64,
    #[serde(default = "MotionConfig::default_max_driving_hours")]
    pub max_driving_hours: f64,
}

impl MotionConfig {
    fn default_speed_kmh() -> f64 {
        60.0
    }
    fn default_fuel_loaded_pct_per_10km() -> f64 {
        0.4
    }
    fn default_fuel_empty_pct_per_10km() -> f64 {
        0.3
    }
    fn default_position_event_every_n_ticks() -> u32 {
        5
    }
    fn default_idle_timeout_minutes() -> f64 {
        30.0
    }
    fn default_max_driving_hours() -> f64 {
        11.0
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed_kmh: Self::default_speed_kmh(),
            fuel_loaded_pct_per_10km: Self::default_fuel_loaded_pct_per_10km(),
            fuel_empty_pct_per_10km: Self::default_fuel_empty_pct_per_10km(),
            position_event_every_n_ticks: Self::default_position_event_every_n_ticks(),
            idle_timeout_minutes: Self::default_idle_timeout_minutes(),
            max_driving_hours: Self::default_max_driving_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "MatcherConfig::default_top_k")]
    pub top_k: usize,
    #[serde(default = "MatcherConfig::default_fallback_fanout")]
    pub fallback_fanout: usize,
    #[serde(default = "MatcherConfig::default_profit_margin_min")]
    pub profit_margin_min: f64,
    #[serde(default = "MatcherConfig::default_utilization_min")]
    pub utilization_min: f64,
    #[serde(default = "MatcherConfig::default_cost_per_km")]
    pub cost_per_km: f64,
    #[serde(default = "MatcherConfig::default_cost_per_hour")]
    pub cost_per_hour: f64,
    #[serde(default = "MatcherConfig::default_assumed_speed_kmh")]
    pub assumed_speed_kmh: f64,
    #[serde(default = "MatcherConfig::default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "MatcherConfig::default_high_priority_rate_threshold")]
    pub high_priority_rate_threshold: f64,
}

impl MatcherConfig {
    fn default_top_k() -> usize {
        10
    }
    fn default_fallback_fanout() -> usize {
        3
    }
    fn default_profit_margin_min() -> f64 {
        0.12
    }
    fn default_utilization_min() -> f64 {
        0.85
    }
    fn default_cost_per_km() -> f64 {
        0.5
    }
    fn default_cost_per_hour() -> f64 {
        4.0
    }
    fn default_assumed_speed_kmh() -> f64 {
        60.0
    }
    fn default_timeout_s() -> u64 {
        15
    }
    fn default_high_priority_rate_threshold() -> f64 {
        3.0
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            top_k: Self::default_top_k(),
            fallback_fanout: Self::default_fallback_fanout(),
            profit_margin_min: Self::default_profit_margin_min(),
            utilization_min: Self::default_utilization_min(),
            cost_per_km: Self::default_cost_per_km(),
            cost_per_hour: Self::default_cost_per_hour(),
            assumed_speed_kmh: Self::default_assumed_speed_kmh(),
            timeout_s: Self::default_timeout_s(),
            high_priority_rate_threshold: Self::default_high_priority_rate_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "AdapterConfig::default_detour_budget_km")]
    pub detour_budget_km: f64,
    #[serde(default = "AdapterConfig::default_opportunities_top_m")]
    pub opportunities_top_m: usize,
    #[serde(default = "AdapterConfig::default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "AdapterConfig::default_followup_delay_threshold_min")]
    pub followup_delay_threshold_min: f64,
    #[serde(default = "AdapterConfig::default_followup_margin_min")]
    pub followup_margin_min: f64,
}

impl AdapterConfig {
    fn default_detour_budget_km() -> f64 {
        100.0
    }
    fn default_opportunities_top_m() -> usize {
        5
    }
    fn default_timeout_s() -> u64 {
        20
    }
    fn default_followup_delay_threshold_min() -> f64 {
        60.0
    }
    fn default_followup_margin_min() -> f64 {
        0.20
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            detour_budget_km: Self::default_detour_budget_km(),
            opportunities_top_m: Self::default_opportunities_top_m(),
            timeout_s: Self::default_timeout_s(),
            followup_delay_threshold_min: Self::default_followup_delay_threshold_min(),
            followup_margin_min: Self::default_followup_margin_min(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "RouteConfig::default_url")]
    pub url: Option<String>,
    #[serde(default = "RouteConfig::default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "RouteConfig::default_retries")]
    pub retries: u32,
    #[serde(default = "RouteConfig::default_total_budget_s")]
    pub total_budget_s: u64,
    #[serde(default = "RouteConfig::default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "RouteConfig::default_cache_ttl_s")]
    pub cache_ttl_s: u64,
    #[serde(default = "RouteConfig::default_fallback_spacing_km")]
    pub fallback_spacing_km: f64,
    #[serde(default = "RouteConfig::default_fallback_min_points")]
    pub fallback_min_points: usize,
}

impl RouteConfig {
    fn default_url() -> Option<String> {
        None
    }
    fn default_timeout_s() -> u64 {
        15
    }
    fn default_retries() -> u32 {
        1
    }
    fn default_total_budget_s() -> u64 {
        20
    }
    fn default_cache_size() -> usize {
        1024
    }
    fn default_cache_ttl_s() -> u64 {
        3600
    }
    fn default_fallback_spacing_km() -> f64 {
        5.0
    }
    fn default_fallback_min_points() -> usize {
        20
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout_s: Self::default_timeout_s(),
            retries: Self::default_retries(),
            total_budget_s: Self::default_total_budget_s(),
            cache_size: Self::default_cache_size(),
            cache_ttl_s: Self::default_cache_ttl_s(),
            fallback_spacing_km: Self::default_fallback_spacing_km(),
            fallback_min_points: Self::default_fallback_min_points(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "AdvisorConfig::default_url")]
    pub url: Option<String>,
    #[serde(default = "AdvisorConfig::default_timeout_s")]
    pub timeout_s: u64,
}

impl AdvisorConfig {
    fn default_url() -> Option<String> {
        None
    }
    fn default_timeout_s() -> u64 {
        15
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout_s: Self::default_timeout_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "EventsConfig::default_ring_size")]
    pub ring_size: usize,
}

impl EventsConfig {
    fn default_ring_size() -> usize {
        500
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            ring_size: Self::default_ring_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "ObserverConfig::default_near_delivery_progress")]
    pub near_delivery_progress: f64,
    /// Per-cycle probability of the stochastic generator posting a new
    /// load, standing in for a real load-board feed.
    #[serde(default = "ObserverConfig::default_new_load_probability")]
    pub new_load_probability: f64,
}

impl ObserverConfig {
    fn default_near_delivery_progress() -> f64 {
        0.9
    }

    fn default_new_load_probability() -> f64 {
        0.1
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            near_delivery_progress: Self::default_near_delivery_progress(),
            new_load_probability: Self::default_new_load_probability(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(default = "PredictorConfig::default_traffic_delay_weight")]
    pub traffic_delay_weight: f64,
    #[serde(default = "PredictorConfig::default_low_fuel_threshold_pct")]
    pub low_fuel_threshold_pct: f64,
}

impl PredictorConfig {
    fn default_traffic_delay_weight() -> f64 {
        1.0
    }
    fn default_low_fuel_threshold_pct() -> f64 {
        10.0
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            traffic_delay_weight: Self::default_traffic_delay_weight(),
            low_fuel_threshold_pct: Self::default_low_fuel_threshold_pct(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.tick.period_motion_s, 3);
        assert_eq!(cfg.tick.period_observer_s, 10);
        assert_eq!(cfg.tick.period_matcher_s, 30);
        assert_eq!(cfg.tick.period_adapter_s, 30);
        assert_eq!(cfg.motion.speed_kmh, 60.0);
        assert_eq!(cfg.motion.fuel_loaded_pct_per_10km, 0.4);
        assert_eq!(cfg.motion.fuel_empty_pct_per_10km, 0.3);
        assert_eq!(cfg.matcher.top_k, 10);
        assert_eq!(cfg.matcher.fallback_fanout, 3);
        assert_eq!(cfg.matcher.profit_margin_min, 0.12);
        assert_eq!(cfg.matcher.utilization_min, 0.85);
        assert_eq!(cfg.adapter.detour_budget_km, 100.0);
        assert_eq!(cfg.adapter.opportunities_top_m, 5);
        assert_eq!(cfg.route.timeout_s, 15);
        assert_eq!(cfg.route.cache_size, 1024);
        assert_eq!(cfg.route.cache_ttl_s, 3600);
        assert_eq!(cfg.events.ring_size, 500);
    }

    #[test]
    fn parses_partial_yaml_with_defaults_filled_in() {
        let yaml = "matcher:\n  top_k: 5\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.matcher.top_k, 5);
        assert_eq!(cfg.matcher.fallback_fanout, 3);
        assert_eq!(cfg.tick.period_motion_s, 3);
    }

    #[test]
    fn load_missing_file_via_load_or_default_falls_back() {
        let cfg = Config::load_or_default("/nonexistent/path/config.yaml");
        assert_eq!(cfg.events.ring_size, 500);
    }
}
