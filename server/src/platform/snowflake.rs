//! Serde helpers for platform snowflakes, which travel as decimal strings.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Text(String),
    Number(i64),
}

fn parse<E: de::Error>(raw: Raw) -> Result<Option<i64>, E> {
    match raw {
        Raw::Number(n) => Ok(Some(n)),
        Raw::Text(s) if s.is_empty() => Ok(None),
        Raw::Text(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| E::custom(format!("invalid snowflake: {s:?}"))),
    }
}

pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    parse(Raw::deserialize(deserializer)?)?.ok_or_else(|| de::Error::custom("empty snowflake"))
}

/// Optional snowflake: `null`, a missing field and `""` all mean absent.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_str(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            Some(raw) => parse(raw),
            None => Ok(None),
        }
    }
}
