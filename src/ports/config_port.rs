//! Configuration access port trait.

/// Raw string values by section and key. Typed parsing and range checks live
/// in `config_validation`, so a malformed number is reported rather than
/// replaced by a default.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
