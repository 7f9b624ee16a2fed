//! Serde helpers for `Duration` fields expressed as integer milliseconds

/// `#[serde(with = "vaultline_core::duration::millis")]`
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `#[serde(with = "vaultline_core::duration::option_millis")]`
pub mod option_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super::millis")]
        interval: Duration,
        #[serde(with = "super::option_millis", default)]
        sweep: Option<Duration>,
    }

    #[test]
    fn test_millis_fields() {
        let parsed: Sample = serde_json::from_str(r#"{"interval": 1500}"#).unwrap();
        assert_eq!(parsed.interval, Duration::from_millis(1500));
        assert_eq!(parsed.sweep, None);

        let json = serde_json::to_string(&Sample {
            interval: Duration::from_secs(2),
            sweep: Some(Duration::from_millis(250)),
        })
        .unwrap();
        assert_eq!(json, r#"{"interval":2000,"sweep":250}"#);
    }
}
