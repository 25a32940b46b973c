//! Engine configuration.

use std::time::Duration;

use dejavu_core::defaults::{
    MATCH_IMAGE_COUNT, MATCH_IMAGE_THRESHOLD, MATCH_TEXT_THRESHOLD, REPLY_DELAY_MS,
};
use dejavu_core::{Error, Result};
use dejavu_search::TenantSearchConfig;

/// Thresholds, page sizes and pacing for the media engine.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Minimum similarity for a duplicate alert.
    pub image_threshold: f32,
    /// Minimum similarity for a retrieval match.
    pub text_threshold: f32,
    /// Alerts per message and matches per retrieval page.
    pub match_count: i64,
    /// Cosine distance within which an ignore-list fingerprint matches.
    pub ignore_radius: f32,
    /// Fixed delay between consecutive outbound replies.
    pub reply_delay: Duration,
    pub search: TenantSearchConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_threshold: MATCH_IMAGE_THRESHOLD,
            text_threshold: MATCH_TEXT_THRESHOLD,
            match_count: MATCH_IMAGE_COUNT,
            ignore_radius: 1.0 - MATCH_IMAGE_THRESHOLD,
            reply_delay: Duration::from_millis(REPLY_DELAY_MS),
            search: TenantSearchConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid {}: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

impl MediaConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MATCH_IMAGE_THRESHOLD` | `0.96` |
    /// | `MATCH_TEXT_THRESHOLD` | `0.24` |
    /// | `MATCH_IMAGE_COUNT` | `3` |
    /// | `IGNORE_RADIUS` | `1 - MATCH_IMAGE_THRESHOLD` |
    /// | `REPLY_DELAY_MS` | `1000` |
    /// | `CHAT_COUNT_TTL_SECS` | `1200` |
    /// | `SEARCH_RECALL` | `balanced` |
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            search: TenantSearchConfig::from_env()?,
            ..Self::default()
        };
        if let Some(v) = parse_env::<f32>("MATCH_IMAGE_THRESHOLD")? {
            config.image_threshold = v;
            config.ignore_radius = 1.0 - v;
        }
        if let Some(v) = parse_env::<f32>("MATCH_TEXT_THRESHOLD")? {
            config.text_threshold = v;
        }
        if let Some(v) = parse_env::<i64>("MATCH_IMAGE_COUNT")? {
            config.match_count = v;
        }
        if let Some(v) = parse_env::<f32>("IGNORE_RADIUS")? {
            config.ignore_radius = v;
        }
        if let Some(v) = parse_env::<u64>("REPLY_DELAY_MS")? {
            config.reply_delay = Duration::from_millis(v);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("MATCH_IMAGE_THRESHOLD", self.image_threshold),
            ("MATCH_TEXT_THRESHOLD", self.text_threshold),
            ("IGNORE_RADIUS", self.ignore_radius),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.match_count <= 0 {
            return Err(Error::Config(format!(
                "MATCH_IMAGE_COUNT must be positive, got {}",
                self.match_count
            )));
        }
        Ok(())
    }

    /// Minimum similarity for an ignore-list match.
    pub fn ignore_threshold(&self) -> f32 {
        1.0 - self.ignore_radius
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_match_count(mut self, count: i64) -> Self {
        self.match_count = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production() {
        let config = MediaConfig::default();
        assert_eq!(config.image_threshold, 0.96);
        assert_eq!(config.text_threshold, 0.24);
        assert_eq!(config.match_count, 3);
        assert_eq!(config.reply_delay, Duration::from_secs(1));
        assert!((config.ignore_threshold() - 0.96).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = MediaConfig::default();
        config.text_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = MediaConfig::default().with_match_count(0);
        assert!(config.validate().is_err());
    }
}
