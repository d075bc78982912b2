//! Opaque audit application id carried through the workflow service.
//!
//! Wire form is `"<catalog_id>:<apply_serial>"`, so a callback can be
//! correlated with its catalog without a lookup table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::{ApplySerial, CatalogId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApplicationId {
    pub catalog_id: CatalogId,
    pub apply_serial: ApplySerial,
}

impl ApplicationId {
    pub fn new(catalog_id: CatalogId, apply_serial: ApplySerial) -> Self {
        Self {
            catalog_id,
            apply_serial,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.catalog_id, self.apply_serial)
    }

    pub fn decode(value: &str) -> Result<Self, ValidationError> {
        let malformed = |reason: &str| ValidationError::MalformedApplicationId {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (catalog, serial) = value
            .split_once(':')
            .ok_or_else(|| malformed("expected '<catalog_id>:<apply_serial>'"))?;

        let catalog_id: i64 = catalog
            .parse()
            .map_err(|_| malformed("catalog id is not an integer"))?;
        if catalog_id <= 0 {
            return Err(malformed("catalog id must be positive"));
        }

        let serial = Uuid::parse_str(serial).map_err(|_| malformed("apply serial is not a uuid"))?;

        Ok(Self::new(CatalogId(catalog_id), ApplySerial(serial)))
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ApplicationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for ApplicationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for ApplicationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}
