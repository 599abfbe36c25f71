use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    // Spend caps in USD, applied when a subject has not set their own
    pub const DAILY_SPEND_CAP: &str = "MERIDIAN_DAILY_SPEND_CAP";
    pub const MONTHLY_SPEND_CAP: &str = "MERIDIAN_MONTHLY_SPEND_CAP";
    pub const COMPUTE_COST_PER_MINUTE: &str = "MERIDIAN_COMPUTE_COST_PER_MINUTE";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/meridian.db";
    pub const DAILY_SPEND_CAP: f64 = 10.0;
    pub const MONTHLY_SPEND_CAP: f64 = 100.0;
    pub const COMPUTE_COST_PER_MINUTE: f64 = 0.05;
}

fn parse_cap(env_var: &str, default: f64) -> f64 {
    env::var(env_var)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Fallback daily cap for subjects without an explicit setting
    pub default_daily_cap: f64,
    /// Fallback monthly cap for subjects without an explicit setting
    pub default_monthly_cap: f64,
    /// Price of one billed compute minute
    pub compute_cost_per_minute: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var(env_vars::PORT)
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()
                .expect("PORT must be a valid number"),
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            default_daily_cap: parse_cap(env_vars::DAILY_SPEND_CAP, defaults::DAILY_SPEND_CAP),
            default_monthly_cap: parse_cap(
                env_vars::MONTHLY_SPEND_CAP,
                defaults::MONTHLY_SPEND_CAP,
            ),
            compute_cost_per_minute: parse_cap(
                env_vars::COMPUTE_COST_PER_MINUTE,
                defaults::COMPUTE_COST_PER_MINUTE,
            ),
        }
    }
}
