use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::carrier::CarrierId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    BookingRef,
    CarrierId,
    Terminal,
    Gate,
    Date,
    Time,
    Plate,
}

impl EntityKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookingRef => "booking_ref",
            Self::CarrierId => "carrier_id",
            Self::Terminal => "terminal",
            Self::Gate => "gate",
            Self::Date => "date",
            Self::Time => "time",
            Self::Plate => "plate",
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    List(Vec<String>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl EntityValue {
    /// Interprets a loosely typed JSON value according to the entity it names.
    pub fn from_json(key: EntityKey, value: Value) -> Result<Self, String> {
        match (key, value) {
            (EntityKey::Date, Value::String(raw)) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| format!("`date` must be YYYY-MM-DD, got `{raw}`")),
            (EntityKey::Time, Value::String(raw)) => parse_clock(raw.trim())
                .map(Self::Time)
                .ok_or_else(|| format!("`time` must be HH:MM, got `{raw}`")),
            (EntityKey::BookingRef, Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    other => Err(format!("`booking_ref` entries must be strings, got {other}")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            (_, Value::String(text)) => Ok(Self::Text(text)),
            (EntityKey::CarrierId, Value::Number(number)) => Ok(Self::Text(number.to_string())),
            (key, other) => Err(format!("`{key}` has unsupported value {other}")),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Entities resolved for a request. Keys are present only when extracted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntityMap(BTreeMap<EntityKey, EntityValue>);

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: EntityKey, value: EntityValue) {
        self.0.insert(key, value);
    }

    pub fn insert_text(&mut self, key: EntityKey, value: impl Into<String>) {
        self.0.insert(key, EntityValue::Text(value.into()));
    }

    pub fn with_text(mut self, key: EntityKey, value: impl Into<String>) -> Self {
        self.insert_text(key, value);
        self
    }

    pub fn get(&self, key: EntityKey) -> Option<&EntityValue> {
        self.0.get(&key)
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn text(&self, key: EntityKey) -> Option<&str> {
        self.get(key).and_then(EntityValue::as_text)
    }

    pub fn carrier_id(&self) -> Option<CarrierId> {
        self.text(EntityKey::CarrierId).map(CarrierId::new)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self.get(EntityKey::Date) {
            Some(EntityValue::Date(date)) => Some(*date),
            _ => None,
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self.get(EntityKey::Time) {
            Some(EntityValue::Time(time)) => Some(*time),
            _ => None,
        }
    }

    /// All booking references, whether one or many were supplied.
    pub fn booking_refs(&self) -> Vec<String> {
        match self.get(EntityKey::BookingRef) {
            Some(EntityValue::Text(reference)) => vec![reference.clone()],
            Some(EntityValue::List(references)) => references.clone(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.0.keys().copied()
    }
}

impl<'de> Deserialize<'de> for EntityMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<EntityKey, Value>::deserialize(deserializer)?;
        let mut entities = EntityMap::new();
        for (key, value) in raw {
            if value.is_null() {
                continue;
            }
            let value = EntityValue::from_json(key, value).map_err(D::Error::custom)?;
            entities.insert(key, value);
        }
        Ok(entities)
    }
}
