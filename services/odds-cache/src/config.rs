//! Construction parameters of a feed cache
//!
//! A cache is bound for its whole lifetime to one frame of one feed source
//! and to the feed's clock offset from UTC.

use feed_types::frame::FrameType;
use feed_types::ids::SourceId;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest offset west of UTC a feed clock may run at.
pub const MIN_GMT_OFFSET_HOURS: i32 = -12;
/// Largest offset east of UTC a feed clock may run at.
pub const MAX_GMT_OFFSET_HOURS: i32 = 14;

/// Configuration for a feed cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Frame this cache holds.
    pub frame: FrameType,
    /// Feed source used to namespace outgoing identifiers.
    pub source_id: SourceId,
    /// Hours the feed's wall-clock show times are ahead of UTC.
    pub gmt_offset_hours: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            frame: FrameType::Live,
            source_id: SourceId::default(),
            gmt_offset_hours: 0,
        }
    }
}

impl CacheConfig {
    pub fn new(frame: FrameType, source_id: SourceId, gmt_offset_hours: i32) -> Self {
        Self {
            frame,
            source_id,
            gmt_offset_hours,
        }
    }

    /// Same feed settings, bound to another frame.
    pub fn with_frame(&self, frame: FrameType) -> Self {
        Self {
            frame,
            ..self.clone()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_GMT_OFFSET_HOURS..=MAX_GMT_OFFSET_HOURS).contains(&self.gmt_offset_hours) {
            return Err(ConfigError::GmtOffsetOutOfRange {
                hours: self.gmt_offset_hours,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.frame, FrameType::Live);
        assert_eq!(config.source_id, SourceId::new(0));
        assert_eq!(config.gmt_offset_hours, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config =
            CacheConfig::from_json(r#"{"frame":"non_live","source_id":2,"gmt_offset_hours":8}"#)
                .unwrap();
        assert_eq!(config.frame, FrameType::NonLive);
        assert_eq!(config.source_id, SourceId::new(2));
        assert_eq!(config.gmt_offset_hours, 8);
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config = CacheConfig::from_json(r#"{"gmt_offset_hours":-5}"#).unwrap();
        assert_eq!(config.frame, FrameType::Live);
        assert_eq!(config.gmt_offset_hours, -5);
    }

    #[test]
    fn test_rejects_offset_out_of_range() {
        let result = CacheConfig::from_json(r#"{"gmt_offset_hours":15}"#);
        match result.unwrap_err() {
            ConfigError::GmtOffsetOutOfRange { hours } => assert_eq!(hours, 15),
            err => panic!("Expected GmtOffsetOutOfRange, got {:?}", err),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = CacheConfig::from_json(r#"{"frame":"sideways"}"#);
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_with_frame_keeps_feed_settings() {
        let live = CacheConfig::new(FrameType::Live, SourceId::new(4), 8);
        let non_live = live.with_frame(FrameType::NonLive);
        assert_eq!(non_live.frame, FrameType::NonLive);
        assert_eq!(non_live.source_id, SourceId::new(4));
        assert_eq!(non_live.gmt_offset_hours, 8);
    }
}
