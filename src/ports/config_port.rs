//! Configuration access port trait.

/// Read-only key lookup by `[section] key`. Numeric keys are parsed by the
/// domain from [`ConfigPort::get_string`] so malformed values can be reported.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    /// Returns `default` when the key is absent or not a recognised boolean.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Trimmed, non-empty string value.
    fn get_non_empty(&self, section: &str, key: &str) -> Option<String> {
        self.get_string(section, key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
