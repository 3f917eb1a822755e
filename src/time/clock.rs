use chrono::{DateTime, Utc};

/// A port that provides the **current instant** for the application.
///
/// # Purpose
/// Token issuance stamps the current time into the signed value and
/// validation compares against it. Abstracting "now" keeps both pure:
///
/// - Token logic does **not** depend on system time directly
/// - Implementations can be swapped (system clock, fixed clock, mock, etc.)
/// - Tests can cross an expiry window without sleeping
///
/// # Typical Implementations
/// - `SystemClock`: Uses the OS / runtime clock
/// - `FixedClock`: Returns a constant instant (for testing)
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}
