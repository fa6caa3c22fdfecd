//! Configuration access port trait.
//!
//! Values come back raw; parsing and defaults live in
//! `domain::config_validation` so a malformed value is an error rather
//! than a silent fallback.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Section names present in the source.
    fn sections(&self) -> Vec<String>;
}
