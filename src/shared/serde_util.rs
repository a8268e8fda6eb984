//! Custom serde helpers for backend wire formats.

/// (De)serializes a `NaiveDate` as the backend's `yyyy-MM-dd` string.
///
/// Used for query parameters and for date-bearing payload fields such as a
/// temp-lock's `lockUntil`.
pub mod date_ymd {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT)
            .map_err(|e| serde::de::Error::custom(format!("Invalid date {s:?}: {e}")))
    }

    /// Same wire format for an optional field.
    pub mod option {
        use super::FORMAT;
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match date {
                Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = Option::<String>::deserialize(deserializer)?;
            match s {
                Some(s) => NaiveDate::parse_from_str(&s, FORMAT)
                    .map(Some)
                    .map_err(|e| serde::de::Error::custom(format!("Invalid date {s:?}: {e}"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Lock {
        #[serde(with = "super::date_ymd")]
        until: NaiveDate,
    }

    #[test]
    fn test_date_ymd_roundtrip() {
        let json = r#"{"until":"2025-01-01"}"#;
        let lock: Lock = serde_json::from_str(json).unwrap();
        assert_eq!(lock.until, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(serde_json::to_string(&lock).unwrap(), json);
    }

    #[test]
    fn test_date_ymd_rejects_garbage() {
        let result: Result<Lock, _> = serde_json::from_str(r#"{"until":"01/01/2025"}"#);
        assert!(result.is_err());
    }
}
