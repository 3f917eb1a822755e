//! # Environment Variable Utilities
//!
//! Provides helpers for reading environment variables with common type conversions.
//! Includes parsing for boolean flags and numeric values with fallback defaults.
//!
//! Every reader has a `*_from` twin taking a provider closure, so configuration
//! loading can be tested without touching the process environment.
//!
//! # Examples
//! ```rust,no_run
//! use wzs_guard::config::env::{read_flag, read_u32};
//!
//! let secure = read_flag("CSRF_COOKIE_SECURE", true);
//! let ttl = read_u32("CSRF_TTL_SECS", 3600);
//! ```

/// Environment names treated as local development.
const LOCAL_ENVS: [&str; 3] = ["development", "local", "test"];

/// Reads a boolean flag from an environment variable.
///
/// Returns `true` for any of the following case-insensitive values:
/// `"1"`, `"true"`, `"yes"`, `"on"`. An empty value counts as unset.
pub fn read_flag(name: &str, default: bool) -> bool {
    read_flag_from(|k| std::env::var(k).ok(), name, default)
}

/// Reads a boolean flag using a custom provider function.
///
/// # Example
/// ```rust
/// use wzs_guard::config::env::read_flag_from;
///
/// let val = read_flag_from(|_| Some("true".into()), "ENABLE_FEATURE", false);
/// assert!(val);
/// ```
pub fn read_flag_from<F>(provider: F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let Some(v) = provider(name) else {
        return default;
    };

    let s = v.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if s.is_empty() {
        return default;
    }
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Reads an unsigned integer (`u32`) from an environment variable,
/// returning the provided default if parsing fails.
pub fn read_u32(name: &str, default: u32) -> u32 {
    read_u32_from(|k| std::env::var(k).ok(), name, default)
}

/// Reads an unsigned integer (`u32`) using a custom provider function.
///
/// # Example
/// ```rust
/// use wzs_guard::config::env::read_u32_from;
///
/// assert_eq!(read_u32_from(|_| Some(" 42 ".into()), "LIMIT", 10), 42);
/// assert_eq!(read_u32_from(|_| None, "LIMIT", 10), 10);
/// ```
pub fn read_u32_from<F>(provider: F, name: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    provider(name)
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

/// Returns `true` if `app_env` names a local development environment.
///
/// # Example
/// ```rust
/// use wzs_guard::config::env::is_local_env;
///
/// assert!(is_local_env("Development"));
/// assert!(!is_local_env("production"));
/// ```
pub fn is_local_env(app_env: &str) -> bool {
    let app_env = app_env.trim().to_ascii_lowercase();
    LOCAL_ENVS.contains(&app_env.as_str())
}
