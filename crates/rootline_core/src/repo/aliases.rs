//! Property and value aliases for stored documents.
//!
//! Users may rename stored properties (`born` instead of `birth_date`) or use
//! their own vocabulary for values (`M` instead of `male`). Writers ask for
//! the stored name of a canonical property; readers map stored names and
//! values back to canonical ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub trait AliasResolver {
    /// Stored property name for a canonical property.
    fn property_name<'a>(&'a self, canonical: &'a str) -> &'a str;
    /// Canonical property for a stored property name.
    fn canonical_property<'a>(&'a self, stored: &'a str) -> &'a str;
    /// Canonical value for a stored value of a canonical property.
    fn canonical_value<'a>(&'a self, property: &str, stored: &'a str) -> &'a str;
}

/// Identity resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAliases;

impl AliasResolver for NoAliases {
    fn property_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        canonical
    }

    fn canonical_property<'a>(&'a self, stored: &'a str) -> &'a str {
        stored
    }

    fn canonical_value<'a>(&'a self, _property: &str, stored: &'a str) -> &'a str {
        stored
    }
}

/// Table-driven resolver, usually deserialized from host settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasTable {
    /// Canonical property -> stored name.
    pub properties: BTreeMap<String, String>,
    /// Canonical property -> (stored value -> canonical value).
    pub values: BTreeMap<String, BTreeMap<String, String>>,
}

impl AliasTable {
    pub fn with_property(mut self, canonical: &str, stored: &str) -> Self {
        self.properties
            .insert(canonical.to_string(), stored.to_string());
        self
    }

    pub fn with_value(mut self, property: &str, stored: &str, canonical: &str) -> Self {
        self.values
            .entry(property.to_string())
            .or_default()
            .insert(stored.to_string(), canonical.to_string());
        self
    }
}

impl AliasResolver for AliasTable {
    fn property_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.properties
            .get(canonical)
            .map_or(canonical, String::as_str)
    }

    fn canonical_property<'a>(&'a self, stored: &'a str) -> &'a str {
        self.properties
            .iter()
            .find(|(_, alias)| alias.as_str() == stored)
            .map_or(stored, |(canonical, _)| canonical.as_str())
    }

    fn canonical_value<'a>(&'a self, property: &str, stored: &'a str) -> &'a str {
        self.values
            .get(property)
            .and_then(|values| {
                values
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(stored))
                    .map(|(_, canonical)| canonical.as_str())
            })
            .unwrap_or(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::{AliasResolver, AliasTable, NoAliases};

    #[test]
    fn table_maps_both_directions() {
        let aliases = AliasTable::default()
            .with_property("birth_date", "born")
            .with_value("sex", "M", "male");
        assert_eq!(aliases.property_name("birth_date"), "born");
        assert_eq!(aliases.canonical_property("born"), "birth_date");
        assert_eq!(aliases.canonical_property("name"), "name");
        assert_eq!(aliases.canonical_value("sex", "m"), "male");
        assert_eq!(aliases.canonical_value("sex", "female"), "female");
        assert_eq!(NoAliases.property_name("sex"), "sex");
    }
}
