use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A text value stored per locale, persisted as a JSONB object such as
/// `{"fi": "Kauppatori", "sv": "Salutorget"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        LocalizedText(BTreeMap::new())
    }

    pub fn with_value(locale: &str, text: &str) -> Self {
        let mut localized = LocalizedText::new();
        localized.set(locale, text);
        localized
    }

    /// Empty strings are not stored, so an unset field stays unset.
    pub fn set(&mut self, locale: &str, text: &str) {
        if text.is_empty() {
            self.0.remove(locale);
        } else {
            self.0.insert(locale.to_string(), text.to_string());
        }
    }

    pub fn get_exact(&self, locale: &str) -> Option<&str> {
        self.0.get(locale).map(|s| s.as_str())
    }

    /// Requested locale first, then the feed default, then whichever locale
    /// sorts first.
    pub fn resolve(&self, requested: Option<&str>, default_lang: &str) -> Option<&str> {
        requested
            .and_then(|locale| self.get_exact(locale))
            .or_else(|| self.get_exact(default_lang))
            .or_else(|| self.0.values().next().map(|s| s.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Non-string members and non-object values are ignored.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => LocalizedText(
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .filter(|(_, v)| !v.is_empty())
                    .collect(),
            ),
            _ => LocalizedText::new(),
        }
    }
}

/// Sets one locale inside a JSONB locale map in place.
pub fn set_locale_in_json(value: &mut Value, locale: &str, text: &str) {
    let mut localized = LocalizedText::from_json(value);
    localized.set(locale, text);
    *value = localized.to_json();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_prefers_requested_then_default_then_any() {
        let mut text = LocalizedText::with_value("fi", "Kauppatori");
        text.set("sv", "Salutorget");

        assert_eq!(text.resolve(Some("sv"), "fi"), Some("Salutorget"));
        assert_eq!(text.resolve(Some("en"), "fi"), Some("Kauppatori"));
        assert_eq!(text.resolve(None, "fi"), Some("Kauppatori"));

        let only_swedish = LocalizedText::with_value("sv", "Salutorget");
        assert_eq!(only_swedish.resolve(Some("en"), "fi"), Some("Salutorget"));
        assert_eq!(LocalizedText::new().resolve(Some("en"), "fi"), None);
    }

    #[test]
    fn empty_values_are_not_stored() {
        let text = LocalizedText::with_value("fi", "");
        assert!(text.is_empty());
        assert_eq!(text.to_json(), json!({}));
    }

    #[test]
    fn json_in_place_update_keeps_other_locales() {
        let mut value = json!({"fi": "Suomenlinna"});
        set_locale_in_json(&mut value, "en", "Suomenlinna fortress");

        assert_eq!(
            value,
            json!({"fi": "Suomenlinna", "en": "Suomenlinna fortress"})
        );
    }

    #[test]
    fn from_json_ignores_garbage() {
        assert!(LocalizedText::from_json(&json!(null)).is_empty());
        assert_eq!(
            LocalizedText::from_json(&json!({"fi": "a", "en": 3})),
            LocalizedText::with_value("fi", "a")
        );
    }
}
