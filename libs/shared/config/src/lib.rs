use chrono::NaiveTime;
use std::env;
use tracing::warn;

/// Runtime configuration for the scheduling core, sourced from the
/// environment. Missing variables fall back to documented defaults so a
/// bare process still comes up in a usable state.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// Earliest bookable time of day.
    pub business_day_start: NaiveTime,
    /// Latest time an appointment may end.
    pub business_day_end: NaiveTime,
    pub default_slot_minutes: i32,
    /// Minimum length of the free-text booking reason.
    pub min_reason_chars: usize,
    /// Approved appointments may be cancelled up to this many hours before start.
    pub cancellation_cutoff_hours: i64,
    /// Grace period after the scheduled start before an approved
    /// appointment is swept to no-show.
    pub no_show_grace_minutes: i64,
    pub sweep_interval_secs: u64,
    pub store_timeout_secs: u64,
    pub store_url: String,
    pub store_api_key: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            business_day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            business_day_end: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            default_slot_minutes: 30,
            min_reason_chars: 10,
            cancellation_cutoff_hours: 2,
            no_show_grace_minutes: 30,
            sweep_interval_secs: 60,
            store_timeout_secs: 10,
            store_url: String::new(),
            store_api_key: String::new(),
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            business_day_start: env_time("BUSINESS_DAY_START", defaults.business_day_start),
            business_day_end: env_time("BUSINESS_DAY_END", defaults.business_day_end),
            default_slot_minutes: env_parse("DEFAULT_SLOT_MINUTES", defaults.default_slot_minutes),
            min_reason_chars: env_parse("MIN_REASON_CHARS", defaults.min_reason_chars),
            cancellation_cutoff_hours: env_parse(
                "CANCELLATION_CUTOFF_HOURS",
                defaults.cancellation_cutoff_hours,
            ),
            no_show_grace_minutes: env_parse(
                "NO_SHOW_GRACE_MINUTES",
                defaults.no_show_grace_minutes,
            ),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            store_timeout_secs: env_parse("STORE_TIMEOUT_SECS", defaults.store_timeout_secs),
            store_url: env::var("SCHEDULING_STORE_URL").unwrap_or_else(|_| {
                warn!("SCHEDULING_STORE_URL not set, using empty value");
                String::new()
            }),
            store_api_key: env::var("SCHEDULING_STORE_API_KEY").unwrap_or_else(|_| {
                warn!("SCHEDULING_STORE_API_KEY not set, using empty value");
                String::new()
            }),
        };

        if !config.is_store_configured() {
            warn!("Scheduling store not configured - missing environment variables");
        }

        config
    }

    pub fn is_store_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_api_key.is_empty()
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an unparseable value, using default", key);
            default
        }),
        Err(_) => default,
    }
}

fn env_time(key: &str, default: NaiveTime) -> NaiveTime {
    match env::var(key) {
        Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").unwrap_or_else(|_| {
            warn!("{} is not a valid HH:MM time, using default", key);
            default
        }),
        Err(_) => default,
    }
}
