//! Field shaping for the default JSON representation.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

/// Per-route shaping of JSON output.
///
/// Applied to the top-level object, or to every element when the result is
/// an array. Alternate representations are never shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    include: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
    exclude_none: bool,
}

impl SerializeOptions {
    /// No shaping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the named fields.
    #[must_use]
    pub fn include<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.include = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Drop the named fields.
    #[must_use]
    pub fn exclude<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Emit `field` under the name `alias`.
    #[must_use]
    pub fn alias(mut self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.insert(field.into(), alias.into());
        self
    }

    /// Drop fields whose value is `null`.
    #[must_use]
    pub const fn exclude_none(mut self, exclude_none: bool) -> Self {
        self.exclude_none = exclude_none;
        self
    }

    /// Whether applying these options changes nothing.
    pub fn is_identity(&self) -> bool {
        self.include.is_none()
            && self.exclude.is_empty()
            && self.aliases.is_empty()
            && !self.exclude_none
    }

    /// Shape `value`.
    pub fn apply(&self, value: Value) -> Value {
        if self.is_identity() {
            return value;
        }
        match value {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.shape(item)).collect())
            }
            other => self.shape(other),
        }
    }

    fn shape(&self, value: Value) -> Value {
        let Value::Object(fields) = value else {
            return value;
        };
        let shaped: Map<String, Value> = fields
            .into_iter()
            .filter(|(name, _)| self.include.as_ref().is_none_or(|keep| keep.contains(name)))
            .filter(|(name, _)| !self.exclude.contains(name))
            .filter(|(_, value)| !(self.exclude_none && value.is_null()))
            .map(|(name, value)| match self.aliases.get(&name) {
                Some(alias) => (alias.clone(), value),
                None => (name, value),
            })
            .collect();
        Value::Object(shaped)
    }
}
