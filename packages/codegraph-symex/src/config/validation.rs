//! Configuration validation
//!
//! Range checks live next to each config type; this module provides the
//! shared trait plus a helper for inclusive range checks.

use super::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration objects
///
/// # Example
/// ```rust,ignore
/// use codegraph_symex::config::{SymbolicConfig, Validatable};
///
/// fn prepare<C: Validatable>(config: &C) -> ConfigResult<()> {
///     config.validate()
/// }
/// ```
pub trait Validatable {
    /// Validate the configuration
    ///
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Get the configuration name for error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

impl<T: Validatable> Validatable for Option<T> {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            Some(config) => config.validate(),
            None => Ok(()),
        }
    }
}

/// Check `min <= value <= max`, producing a range error with `hint` otherwise
pub fn check_range<T>(field: &str, value: T, min: T, max: T, hint: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString,
{
    if value < min || value > max {
        return Err(ConfigError::range_with_hint(field, value, min, max, hint));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Window(usize);

    impl Validatable for Window {
        fn validate(&self) -> ConfigResult<()> {
            check_range("window", self.0, 1, 10, "window must be small")
        }
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("n", 5usize, 1, 10, "").is_ok());
        assert!(check_range("n", 1usize, 1, 10, "").is_ok());
        assert!(check_range("n", 10usize, 1, 10, "").is_ok());
        assert!(check_range("n", 0usize, 1, 10, "").is_err());
        assert!(check_range("n", 11usize, 1, 10, "").is_err());
    }

    #[test]
    fn test_option_validation() {
        let none: Option<Window> = None;
        assert!(none.validate().is_ok());
        assert!(Some(Window(3)).validate().is_ok());
        assert!(Some(Window(30)).validate().is_err());
    }
}
