//! Engine configuration loaded from `TRIPSTAY_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use tripstay_reservations::{ReservationPolicy, TaxPolicy};

use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub payment_timeout: Duration,
    pub cancellation_cutoff: Duration,
    pub max_write_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub sweep_interval: Duration,
    pub request_timeout: Duration,
    pub gateway_timeout: Duration,
    pub store_timeout: Duration,
    pub tax: TaxPolicy,
    pub bind_addr: SocketAddr,
    /// Unset selects the in-memory store.
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payment_timeout: Duration::from_secs(900),
            cancellation_cutoff: Duration::from_secs(24 * 3600),
            max_write_attempts: 5,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(200),
            sweep_interval: Duration::from_secs(30),
            request_timeout: Duration::from_millis(5000),
            gateway_timeout: Duration::from_millis(3000),
            store_timeout: Duration::from_millis(2000),
            tax: TaxPolicy::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            parse(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };
        let millis = |key: &str, default: Duration| {
            parse(&lookup, key, default.as_millis() as u64).map(Duration::from_millis)
        };

        let cfg = Self {
            payment_timeout: secs("TRIPSTAY_PAYMENT_TIMEOUT_SECS", d.payment_timeout)?,
            cancellation_cutoff: parse(
                &lookup,
                "TRIPSTAY_CANCELLATION_CUTOFF_HOURS",
                d.cancellation_cutoff.as_secs() / 3600,
            )
            .map(|h: u64| Duration::from_secs(h.saturating_mul(3600)))?,
            max_write_attempts: parse(&lookup, "TRIPSTAY_MAX_WRITE_ATTEMPTS", d.max_write_attempts)?,
            backoff_base: millis("TRIPSTAY_BACKOFF_BASE_MS", d.backoff_base)?,
            backoff_max: millis("TRIPSTAY_BACKOFF_MAX_MS", d.backoff_max)?,
            sweep_interval: secs("TRIPSTAY_SWEEP_INTERVAL_SECS", d.sweep_interval)?,
            request_timeout: millis("TRIPSTAY_REQUEST_TIMEOUT_MS", d.request_timeout)?,
            gateway_timeout: millis("TRIPSTAY_GATEWAY_TIMEOUT_MS", d.gateway_timeout)?,
            store_timeout: millis("TRIPSTAY_STORE_TIMEOUT_MS", d.store_timeout)?,
            tax: TaxPolicy {
                rate_bps: parse(&lookup, "TRIPSTAY_TAX_RATE_BPS", d.tax.rate_bps)?,
                absorbed_by_platform: parse(
                    &lookup,
                    "TRIPSTAY_TAX_ABSORBED_BY_PLATFORM",
                    d.tax.absorbed_by_platform,
                )?,
            },
            bind_addr: parse(&lookup, "TRIPSTAY_BIND_ADDR", d.bind_addr)?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
        };

        if cfg.max_write_attempts == 0 {
            return Err(invalid("TRIPSTAY_MAX_WRITE_ATTEMPTS", "0"));
        }
        if cfg.sweep_interval.is_zero() {
            return Err(invalid("TRIPSTAY_SWEEP_INTERVAL_SECS", "0"));
        }
        if cfg.tax.rate_bps > 10_000 {
            return Err(invalid("TRIPSTAY_TAX_RATE_BPS", &cfg.tax.rate_bps.to_string()));
        }
        Ok(cfg)
    }

    pub fn reservation_policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            cancellation_cutoff: to_chrono(self.cancellation_cutoff),
            payment_timeout: to_chrono(self.payment_timeout),
        }
    }

    pub fn write_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_write_attempts, self.backoff_base, self.backoff_max)
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(
            cfg.reservation_policy(),
            ReservationPolicy {
                cancellation_cutoff: chrono::Duration::hours(24),
                payment_timeout: chrono::Duration::minutes(15),
            }
        );
        assert!(cfg.tax.absorbed_by_platform);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("TRIPSTAY_CANCELLATION_CUTOFF_HOURS", "12"),
            ("TRIPSTAY_MAX_WRITE_ATTEMPTS", "3"),
            ("TRIPSTAY_TAX_ABSORBED_BY_PLATFORM", "false"),
            ("TRIPSTAY_BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/tripstay"),
        ]))
        .unwrap();

        assert_eq!(cfg.cancellation_cutoff, Duration::from_secs(12 * 3600));
        assert_eq!(cfg.write_retry().max_attempts, 3);
        assert!(!cfg.tax.absorbed_by_platform);
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/tripstay"));
    }

    #[test]
    fn malformed_values_name_the_key() {
        let err = EngineConfig::from_lookup(lookup(&[("TRIPSTAY_SWEEP_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "TRIPSTAY_SWEEP_INTERVAL_SECS".into(),
                value: "soon".into()
            }
        );

        assert!(EngineConfig::from_lookup(lookup(&[("TRIPSTAY_MAX_WRITE_ATTEMPTS", "0")])).is_err());
    }
}
