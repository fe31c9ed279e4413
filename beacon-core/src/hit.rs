//! Builders for common hit types.
//!
//! A [`Hit`] is just an ordered parameter list; pass it straight to
//! [`Tracker::track`](crate::Tracker::track).

use std::fmt;

/// Value of the `t` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitType {
    Pageview,
    Screenview,
    Event,
    Exception,
    Timing,
}

impl HitType {
    pub fn as_str(self) -> &'static str {
        match self {
            HitType::Pageview => "pageview",
            HitType::Screenview => "screenview",
            HitType::Event => "event",
            HitType::Exception => "exception",
            HitType::Timing => "timing",
        }
    }
}

impl fmt::Display for HitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered parameter list for one hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    parameters: Vec<(String, String)>,
}

impl Hit {
    /// Starts a hit with only the `t` parameter set.
    pub fn new(hit_type: HitType) -> Self {
        Self {
            parameters: vec![("t".to_string(), hit_type.as_str().to_string())],
        }
    }

    /// Page view of `path` (`dp`).
    pub fn pageview(path: impl Into<String>) -> Self {
        Self::new(HitType::Pageview).param("dp", path)
    }

    /// App screen view of `screen_name` (`cd`).
    pub fn screenview(screen_name: impl Into<String>) -> Self {
        Self::new(HitType::Screenview).param("cd", screen_name)
    }

    /// Event with category (`ec`) and action (`ea`).
    pub fn event(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(HitType::Event)
            .param("ec", category)
            .param("ea", action)
    }

    /// Exception with description (`exd`) and fatality flag (`exf`).
    pub fn exception(description: impl Into<String>, fatal: bool) -> Self {
        Self::new(HitType::Exception)
            .param("exd", description)
            .param("exf", if fatal { "1" } else { "0" })
    }

    /// User timing: category (`utc`), variable (`utv`), milliseconds (`utt`).
    pub fn timing(category: impl Into<String>, variable: impl Into<String>, millis: u64) -> Self {
        Self::new(HitType::Timing)
            .param("utc", category)
            .param("utv", variable)
            .param("utt", millis.to_string())
    }

    /// Event label (`el`).
    pub fn label(self, label: impl Into<String>) -> Self {
        self.param("el", label)
    }

    /// Event value (`ev`).
    pub fn value(self, value: u64) -> Self {
        self.param("ev", value.to_string())
    }

    /// Appends an arbitrary parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }
}

impl IntoIterator for Hit {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.into_iter()
    }
}

#[cfg(test)]
mod hit_tests {
    use super::*;

    fn pairs(hit: &Hit) -> Vec<(&str, &str)> {
        hit.parameters()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_event_hit_parameters_in_order() {
        let hit = Hit::event("video", "play").label("intro").value(42);
        assert_eq!(
            pairs(&hit),
            vec![
                ("t", "event"),
                ("ec", "video"),
                ("ea", "play"),
                ("el", "intro"),
                ("ev", "42")
            ]
        );
    }

    #[test]
    fn test_exception_and_timing_hits() {
        assert_eq!(
            pairs(&Hit::exception("IOException", true)),
            vec![("t", "exception"), ("exd", "IOException"), ("exf", "1")]
        );
        assert_eq!(
            pairs(&Hit::timing("startup", "load", 1250)),
            vec![("t", "timing"), ("utc", "startup"), ("utv", "load"), ("utt", "1250")]
        );
    }

    #[test]
    fn test_view_hits() {
        assert_eq!(
            pairs(&Hit::pageview("/home")),
            vec![("t", "pageview"), ("dp", "/home")]
        );
        assert_eq!(
            pairs(&Hit::screenview("Settings").param("an", "Beacon")),
            vec![("t", "screenview"), ("cd", "Settings"), ("an", "Beacon")]
        );
    }

    #[test]
    fn test_hit_type_display() {
        assert_eq!(HitType::Screenview.to_string(), "screenview");
        assert_eq!(Hit::new(HitType::Timing).into_iter().count(), 1);
    }
}
