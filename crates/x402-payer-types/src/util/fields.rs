//! Reading JSON objects whose fields go by several spellings.
//!
//! The first spelling that is present and well-typed wins; later ones are ignored.
//! A malformed value only costs that one field.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A borrowed JSON object read field by field.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    context: &'static str,
}

impl<'a> Fields<'a> {
    /// `context` names the object in log lines, e.g. `"receipt"`.
    pub fn new(map: &'a Map<String, Value>, context: &'static str) -> Self {
        Self { map, context }
    }

    /// The value under the first of `spellings` that is present, non-null and
    /// deserializes as `T`. A value of the wrong type is logged and skipped.
    pub fn first<T: DeserializeOwned>(&self, spellings: &[&str]) -> Option<T> {
        for spelling in spellings {
            let Some(value) = self.map.get(*spelling).filter(|v| !v.is_null()) else {
                continue;
            };
            match T::deserialize(value) {
                Ok(parsed) => return Some(parsed),
                Err(e) => tracing::warn!(
                    object = self.context,
                    field = *spelling,
                    error = %e,
                    "Ignoring malformed field"
                ),
            }
        }
        None
    }

    /// The raw value under the first of `spellings` that is present and non-null.
    pub fn raw(&self, spellings: &[&str]) -> Option<&'a Value> {
        spellings
            .iter()
            .find_map(|spelling| self.map.get(*spelling).filter(|v| !v.is_null()))
    }

    pub fn contains_any(&self, spellings: &[&str]) -> bool {
        self.raw(spellings).is_some()
    }
}
