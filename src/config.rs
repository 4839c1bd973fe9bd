#![allow(dead_code)]
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_engine_config"))]
pub struct EngineConfig {
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default = "default_max_soc_threshold")]
    pub max_soc_threshold: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default = "default_min_soc_threshold")]
    pub min_soc_threshold: f64,

    #[validate(range(min = 0.0))]
    #[serde(default = "default_hws_power_rating")]
    pub hws_power_rating: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default = "default_hws_soc_drop_threshold")]
    pub hws_soc_drop_threshold: f64,

    #[validate(range(min = 0.0))]
    #[serde(default = "default_hws_generation_drop_threshold")]
    pub hws_generation_drop_threshold: f64,

    #[validate(range(min = 1))]
    #[serde(default = "default_hws_cooldown_period_min")]
    pub hws_cooldown_period_min: u64,

    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default = "default_export_target_percentage")]
    pub export_target_percentage: f64,

    #[serde(default = "default_battery_charging_threshold")]
    pub battery_charging_threshold: f64,

    #[serde(default = "default_strong_charging_threshold")]
    pub strong_charging_threshold: f64,

    #[serde(default = "default_min_generation_for_export")]
    pub min_generation_for_export: f64,

    #[serde(default = "default_min_generation_to_stay_export")]
    pub min_generation_to_stay_export: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default = "default_evening_self_consume_soc_threshold")]
    pub evening_self_consume_soc_threshold: f64,

    #[validate(range(min = 1))]
    #[serde(default = "default_state_change_debounce_time_min")]
    pub state_change_debounce_time_min: u64,

    #[serde(default = "default_significant_export_threshold")]
    pub significant_export_threshold: f64,

    #[validate(range(min = 0, max = 23))]
    #[serde(default = "default_night_start_hour")]
    pub night_start_hour: u32,

    #[validate(range(min = 0, max = 23))]
    #[serde(default = "default_night_end_hour")]
    pub night_end_hour: u32,

    #[validate(range(min = 1))]
    #[serde(default = "default_catchup_days")]
    pub catchup_days: u32,

    #[serde(default = "default_catchup_aggressiveness")]
    pub catchup_aggressiveness: f64,

    #[validate(range(min = 1))]
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    #[validate(range(min = 1))]
    #[serde(default = "default_log_max_age_days")]
    pub log_max_age_days: i64,

    #[validate(range(min = 1))]
    #[serde(default = "default_log_cleanup_interval_hours")]
    pub log_cleanup_interval_hours: i64,

    #[serde(default = "default_monthly_targets")]
    pub monthly_targets: HashMap<u32, f64>,

    #[validate(range(min = -12, max = 14))]
    #[serde(default = "default_local_offset_hours")]
    pub local_offset_hours: i32,

    #[validate(nested)]
    #[serde(default)]
    pub server: ServerConfig,

    #[validate(nested)]
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

/// HTTP surface configuration (read-only status endpoints only).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    #[serde(default = "default_host")]
    pub host: String,

    #[validate(range(min = 1, max = 65535))]
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Where the engine persists its `EngineState` aggregate.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StoreConfig {
    #[validate(length(min = 1))]
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn validate_engine_config(config: &EngineConfig) -> Result<(), validator::ValidationError> {
    if config.min_soc_threshold >= config.max_soc_threshold {
        return Err(validator::ValidationError::new(
            "min_soc_threshold must be less than max_soc_threshold",
        ));
    }
    if config.min_generation_to_stay_export >= config.min_generation_for_export {
        return Err(validator::ValidationError::new(
            "min_generation_to_stay_export must be lower than min_generation_for_export (hysteresis requires the exit threshold to sit below the entry threshold)",
        ));
    }
    if config.night_start_hour > 23 || config.night_end_hour > 23 {
        return Err(validator::ValidationError::new("night hours must be 0..=23"));
    }
    Ok(())
}

fn default_max_soc_threshold() -> f64 {
    99.0
}
fn default_min_soc_threshold() -> f64 {
    25.0
}
fn default_hws_power_rating() -> f64 {
    3000.0
}
fn default_hws_soc_drop_threshold() -> f64 {
    5.0
}
fn default_hws_generation_drop_threshold() -> f64 {
    1500.0
}
fn default_hws_cooldown_period_min() -> u64 {
    30
}
fn default_export_target_percentage() -> f64 {
    40.0
}
fn default_battery_charging_threshold() -> f64 {
    50.0
}
fn default_strong_charging_threshold() -> f64 {
    1000.0
}
fn default_min_generation_for_export() -> f64 {
    500.0
}
fn default_min_generation_to_stay_export() -> f64 {
    300.0
}
fn default_evening_self_consume_soc_threshold() -> f64 {
    30.0
}
fn default_state_change_debounce_time_min() -> u64 {
    5
}
fn default_significant_export_threshold() -> f64 {
    2000.0
}
fn default_night_start_hour() -> u32 {
    21
}
fn default_night_end_hour() -> u32 {
    6
}
fn default_catchup_days() -> u32 {
    5
}
fn default_catchup_aggressiveness() -> f64 {
    1.0
}
fn default_max_log_entries() -> usize {
    500
}
fn default_log_max_age_days() -> i64 {
    90
}
fn default_log_cleanup_interval_hours() -> i64 {
    24
}
fn default_monthly_targets() -> HashMap<u32, f64> {
    // kWh/day seasonal schedule, roughly tracking southern-hemisphere solar yield.
    HashMap::from([
        (1, 28.0),
        (2, 27.0),
        (3, 25.0),
        (4, 22.0),
        (5, 18.0),
        (6, 16.0),
        (7, 23.5),
        (8, 19.0),
        (9, 22.0),
        (10, 25.0),
        (11, 27.0),
        (12, 28.5),
    ])
}
fn default_local_offset_hours() -> i32 {
    10
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_tick_seconds() -> u64 {
    10
}

impl EngineConfig {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Later sources override earlier ones:
    /// 1. `config/default.toml`
    /// 2. environment variables prefixed `ETC__`, double-underscore nested
    ///    (e.g. `ETC__SERVER__PORT`).
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("ETC__").split("__"));

        let config: EngineConfig = figment.extract().context("failed to parse configuration")?;
        config
            .validate()
            .context("configuration validation failed")?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_soc_threshold: default_max_soc_threshold(),
            min_soc_threshold: default_min_soc_threshold(),
            hws_power_rating: default_hws_power_rating(),
            hws_soc_drop_threshold: default_hws_soc_drop_threshold(),
            hws_generation_drop_threshold: default_hws_generation_drop_threshold(),
            hws_cooldown_period_min: default_hws_cooldown_period_min(),
            export_target_percentage: default_export_target_percentage(),
            battery_charging_threshold: default_battery_charging_threshold(),
            strong_charging_threshold: default_strong_charging_threshold(),
            min_generation_for_export: default_min_generation_for_export(),
            min_generation_to_stay_export: default_min_generation_to_stay_export(),
            evening_self_consume_soc_threshold: default_evening_self_consume_soc_threshold(),
            state_change_debounce_time_min: default_state_change_debounce_time_min(),
            significant_export_threshold: default_significant_export_threshold(),
            night_start_hour: default_night_start_hour(),
            night_end_hour: default_night_end_hour(),
            catchup_days: default_catchup_days(),
            catchup_aggressiveness: default_catchup_aggressiveness(),
            max_log_entries: default_max_log_entries(),
            log_max_age_days: default_log_max_age_days(),
            log_cleanup_interval_hours: default_log_cleanup_interval_hours(),
            monthly_targets: default_monthly_targets(),
            local_offset_hours: default_local_offset_hours(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            tick_seconds: default_tick_seconds(),
        }
    }
}
