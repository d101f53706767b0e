use std::collections::HashMap;

use anyhow::Context;
use axum::http::HeaderMap;

const EN: &str = include_str!("../../locales/en.json");
const VI: &str = include_str!("../../locales/vi.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    En,
    Vi,
}

impl Locale {
    pub fn parse(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Locale::En),
            "vi" => Some(Locale::Vi),
            _ => None,
        }
    }
}

/// Message catalogs loaded once at startup and shared through `AppState`.
pub struct Translator {
    catalogs: HashMap<Locale, HashMap<String, String>>,
    default_locale: Locale,
}

impl Translator {
    pub fn load(default_locale: Locale) -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        catalogs.insert(
            Locale::En,
            serde_json::from_str(EN).context("failed to parse en catalog")?,
        );
        catalogs.insert(
            Locale::Vi,
            serde_json::from_str(VI).context("failed to parse vi catalog")?,
        );
        Ok(Self {
            catalogs,
            default_locale,
        })
    }

    pub fn t(&self, locale: Locale, key: &str) -> String {
        self.catalogs
            .get(&locale)
            .and_then(|c| c.get(key))
            .or_else(|| {
                self.catalogs
                    .get(&self.default_locale)
                    .and_then(|c| c.get(key))
            })
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// First supported language in `Accept-Language`, else the default.
    pub fn negotiate(&self, headers: &HeaderMap) -> Locale {
        headers
            .get("accept-language")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',')
                    .filter_map(|part| part.split(';').next())
                    .find_map(Locale::parse)
            })
            .unwrap_or(self.default_locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translates_known_key() {
        let i18n = Translator::load(Locale::En).unwrap();
        assert_eq!(
            i18n.t(Locale::En, "error.room_not_found"),
            "Room not found"
        );
        assert_ne!(
            i18n.t(Locale::Vi, "error.room_not_found"),
            "Room not found"
        );
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        let i18n = Translator::load(Locale::En).unwrap();
        assert_eq!(i18n.t(Locale::Vi, "error.nope"), "error.nope");
    }

    #[test]
    fn test_negotiate_accept_language() {
        let i18n = Translator::load(Locale::En).unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(i18n.negotiate(&headers), Locale::En);

        headers.insert("accept-language", "fr-FR, vi-VN;q=0.8".parse().unwrap());
        assert_eq!(i18n.negotiate(&headers), Locale::Vi);
    }
}
