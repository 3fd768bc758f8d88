/// MySQL `DATE` format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// MySQL `TIME` format with optional fractional seconds.
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// MySQL `DATETIME` and `TIMESTAMP` format with optional fractional seconds.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
