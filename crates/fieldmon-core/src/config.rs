use chrono::FixedOffset;

use crate::app_config::{AppConfig, Environment};
use crate::presence::{DEFAULT_UTC_OFFSET_SECS, MAX_WINDOW_DAYS};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a working
/// development configuration.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let env = parse_environment(&or_default("FIELDMON_ENV", "development"))?;
    let bind_addr = parse_addr("FIELDMON_BIND_ADDR", "0.0.0.0:8080")?;
    let log_level = or_default("FIELDMON_LOG_LEVEL", "info");
    let data_file = PathBuf::from(or_default("FIELDMON_DATA_FILE", "./data.json"));
    let public_dir = PathBuf::from(or_default("FIELDMON_PUBLIC_DIR", "./public"));

    let remote_url = or_default("FIELDMON_REMOTE_URL", "http://localhost:8080/api/data");
    let api_token = lookup("FIELDMON_API_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let remote_plain_text = parse_bool("FIELDMON_REMOTE_PLAIN_TEXT", "false")?;
    let request_timeout_secs = match lookup("FIELDMON_REQUEST_TIMEOUT_SECS") {
        Ok(raw) => Some(
            raw.parse::<u64>()
                .map_err(|e| invalid("FIELDMON_REQUEST_TIMEOUT_SECS", e.to_string()))?,
        ),
        Err(_) => None,
    };

    let cache_dir = PathBuf::from(or_default("FIELDMON_CACHE_DIR", "./.fieldmon-cache"));
    let catalog_path = PathBuf::from(or_default("FIELDMON_CATALOG_PATH", "./stores.csv"));
    let our_office_token = or_default("FIELDMON_OUR_OFFICE", "Максутов");
    if our_office_token.trim().is_empty() {
        return Err(invalid(
            "FIELDMON_OUR_OFFICE",
            "office token must be non-empty".to_string(),
        ));
    }

    let window_days = or_default("FIELDMON_WINDOW_DAYS", "14")
        .parse::<u16>()
        .map(i64::from)
        .map_err(|e| invalid("FIELDMON_WINDOW_DAYS", e.to_string()))?;
    if window_days > MAX_WINDOW_DAYS {
        return Err(invalid(
            "FIELDMON_WINDOW_DAYS",
            format!("window must be at most {MAX_WINDOW_DAYS} days"),
        ));
    }
    let utc_offset = match lookup("FIELDMON_UTC_OFFSET") {
        Ok(raw) => parse_utc_offset(&raw).map_err(|reason| invalid("FIELDMON_UTC_OFFSET", reason))?,
        Err(_) => FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS)
            .ok_or_else(|| invalid("FIELDMON_UTC_OFFSET", "default offset out of range".to_string()))?,
    };
    let poll_interval_secs = parse_u64("FIELDMON_POLL_INTERVAL_SECS", "30")?;
    if poll_interval_secs == 0 {
        return Err(invalid(
            "FIELDMON_POLL_INTERVAL_SECS",
            "interval must be at least 1 second".to_string(),
        ));
    }
    let default_observer = or_default("FIELDMON_OBSERVER", "field-rep");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        data_file,
        public_dir,
        remote_url,
        api_token,
        remote_plain_text,
        request_timeout_secs,
        cache_dir,
        catalog_path,
        our_office_token,
        window_days,
        utc_offset,
        poll_interval_secs,
        default_observer,
    })
}

/// Parse `+hh:mm`, `-hh:mm` or `Z` into a fixed offset.
fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "offset out of range".to_string());
    }
    raw.parse::<FixedOffset>()
        .map_err(|e| format!("expected an offset like +03:00, got '{raw}': {e}"))
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FIELDMON_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_environment_known_values() {
        assert_eq!(
            parse_environment("development").unwrap(),
            Environment::Development
        );
        assert_eq!(parse_environment("test").unwrap(), Environment::Test);
        assert_eq!(
            parse_environment("production").unwrap(),
            Environment::Production
        );
    }

    #[test]
    fn parse_environment_unknown_fails() {
        let err = parse_environment("staging").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "FIELDMON_ENV"));
    }

    #[test]
    fn build_app_config_defaults_from_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).expect("defaults should be valid");
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.remote_url, "http://localhost:8080/api/data");
        assert!(cfg.api_token.is_none());
        assert!(!cfg.remote_plain_text);
        assert!(cfg.request_timeout_secs.is_none());
        assert_eq!(cfg.our_office_token, "Максутов");
        assert_eq!(cfg.window_days, 14);
        assert_eq!(cfg.utc_offset.local_minus_utc(), 3 * 3600);
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.default_observer, "field-rep");
    }

    #[test]
    fn build_app_config_fails_with_invalid_bind_addr() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_BIND_ADDR", "not-a-socket-addr");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_BIND_ADDR"),
            "expected InvalidEnvVar(FIELDMON_BIND_ADDR), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_ENV", "production");
        map.insert("FIELDMON_REMOTE_URL", "https://script.example.com/exec");
        map.insert("FIELDMON_API_TOKEN", "secret");
        map.insert("FIELDMON_REMOTE_PLAIN_TEXT", "true");
        map.insert("FIELDMON_REQUEST_TIMEOUT_SECS", "20");
        map.insert("FIELDMON_OUR_OFFICE", "Acme");
        map.insert("FIELDMON_WINDOW_DAYS", "7");
        map.insert("FIELDMON_UTC_OFFSET", "-05:30");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Production);
        assert_eq!(cfg.remote_url, "https://script.example.com/exec");
        assert_eq!(cfg.api_token.as_deref(), Some("secret"));
        assert!(cfg.remote_plain_text);
        assert_eq!(cfg.request_timeout_secs, Some(20));
        assert_eq!(cfg.our_office_token, "Acme");
        assert_eq!(cfg.window_days, 7);
        assert_eq!(cfg.utc_offset.local_minus_utc(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn build_app_config_treats_blank_token_as_unset() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_API_TOKEN", "   ");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn build_app_config_rejects_negative_window() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_WINDOW_DAYS", "-1");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_WINDOW_DAYS"),
            "expected InvalidEnvVar(FIELDMON_WINDOW_DAYS), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_caps_window_at_a_year() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_WINDOW_DAYS", "366");
        assert_eq!(build_app_config(lookup_from_map(&map)).unwrap().window_days, 366);

        for too_wide in ["367", "65535", "4294967295"] {
            map.insert("FIELDMON_WINDOW_DAYS", too_wide);
            let result = build_app_config(lookup_from_map(&map));
            assert!(
                matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_WINDOW_DAYS"),
                "expected InvalidEnvVar(FIELDMON_WINDOW_DAYS) for {too_wide}, got: {result:?}"
            );
        }
    }

    #[test]
    fn build_app_config_reads_utc_offset() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_UTC_OFFSET", "Z");
        assert_eq!(build_app_config(lookup_from_map(&map)).unwrap().utc_offset.local_minus_utc(), 0);

        map.insert("FIELDMON_UTC_OFFSET", "Moscow");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_UTC_OFFSET"),
            "expected InvalidEnvVar(FIELDMON_UTC_OFFSET), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_zero_poll_interval() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_POLL_INTERVAL_SECS", "0");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_POLL_INTERVAL_SECS"),
            "expected InvalidEnvVar(FIELDMON_POLL_INTERVAL_SECS), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_bad_boolean() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_REMOTE_PLAIN_TEXT", "maybe");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_REMOTE_PLAIN_TEXT"),
            "expected InvalidEnvVar(FIELDMON_REMOTE_PLAIN_TEXT), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_invalid_timeout() {
        let mut map = HashMap::new();
        map.insert("FIELDMON_REQUEST_TIMEOUT_SECS", "soon");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIELDMON_REQUEST_TIMEOUT_SECS"),
            "expected InvalidEnvVar(FIELDMON_REQUEST_TIMEOUT_SECS), got: {result:?}"
        );
    }
}
