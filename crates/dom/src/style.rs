//! Inline / framework-asserted style layers and computed resolution

use std::collections::BTreeMap;

/// Ordered property -> value map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleMap {
    properties: BTreeMap<String, String>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn set(&mut self, property: &str, value: &str) {
        self.properties
            .insert(property.to_string(), value.to_string());
    }

    /// Remove a property; mirrors setting an inline style back to `""`.
    pub fn remove(&mut self, property: &str) -> Option<String> {
        self.properties.remove(property)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.properties.iter()
    }
}

/// Fallback value when neither style layer sets the property.
pub fn default_value(property: &str) -> &'static str {
    match property {
        "display" => "block",
        "visibility" => "visible",
        "opacity" => "1",
        "pointer-events" => "auto",
        "z-index" => "0",
        _ => "",
    }
}

/// Resolve a property: inline wins over framework-asserted, which wins
/// over the default.
pub fn resolve<'a>(inline: &'a StyleMap, framework: &'a StyleMap, property: &str) -> &'a str {
    if let Some(value) = inline.get(property) {
        return value;
    }
    if let Some(value) = framework.get(property) {
        return value;
    }
    default_value(property)
}
