use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How the create stage names a new object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    #[default]
    Uuid,
    /// Epoch milliseconds. Not unique across concurrent invocations.
    Timestamp,
}

impl KeyStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Timestamp => "timestamp",
        }
    }

    pub fn generate(self, now: DateTime<Utc>) -> String {
        match self {
            Self::Uuid => Uuid::new_v4().to_string(),
            Self::Timestamp => now.timestamp_millis().to_string(),
        }
    }
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "uuid" => Ok(Self::Uuid),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(format!(
                "unknown key strategy '{other}', expected 'uuid' or 'timestamp'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn uuid_keys_are_not_reused() {
        let now = Utc::now();
        let keys: HashSet<String> = (0..256).map(|_| KeyStrategy::Uuid.generate(now)).collect();
        assert_eq!(keys.len(), 256);
    }

    #[test]
    fn timestamp_keys_use_epoch_millis() {
        let now = Utc
            .timestamp_millis_opt(1_771_027_200_123)
            .single()
            .expect("valid timestamp");
        assert_eq!(KeyStrategy::Timestamp.generate(now), "1771027200123");
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("UUID".parse::<KeyStrategy>(), Ok(KeyStrategy::Uuid));
        assert_eq!(" timestamp ".parse::<KeyStrategy>(), Ok(KeyStrategy::Timestamp));
        assert!("random".parse::<KeyStrategy>().is_err());
    }
}
