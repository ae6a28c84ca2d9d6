//! Internationalization (i18n) support
//!
//! Translation tables for `pt-BR` and `en` are compiled into the binary. A
//! site can override or add languages with YAML files in its `locales/`
//! directory.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Language used when a key is missing from the selected one
const FALLBACK_LANGUAGE: &str = "en";

const EMBEDDED: [(&str, &str); 2] = [
    ("pt-BR", include_str!("locales/pt-BR.yml")),
    ("en", include_str!("locales/en.yml")),
];

type Table = HashMap<String, serde_yaml::Value>;

/// Internationalization handler
#[derive(Debug, Clone)]
pub struct I18n {
    /// Current language
    language: String,
    /// Language data: lang -> key -> translation
    translations: HashMap<String, Table>,
}

impl I18n {
    /// Create a handler with the built-in tables loaded
    pub fn new(language: &str) -> Self {
        let mut i18n = Self::empty(language);
        for (lang, source) in EMBEDDED {
            match serde_yaml::from_str::<Table>(source) {
                Ok(table) => {
                    i18n.translations.insert(lang.to_string(), table);
                }
                Err(e) => tracing::error!("Built-in language table {} is invalid: {}", lang, e),
            }
        }
        if !i18n.translations.contains_key(language) {
            tracing::warn!(
                "No translations for {:?}, falling back to {:?}",
                language,
                FALLBACK_LANGUAGE
            );
        }
        i18n
    }

    fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            translations: HashMap::new(),
        }
    }

    /// Load language files from a directory, merging over the built-in tables
    pub fn load_languages<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            let ext = path.extension().and_then(|e| e.to_str());
            if !path.is_file() || !matches!(ext, Some("yml") | Some("yaml")) {
                continue;
            }

            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            match serde_yaml::from_str::<Table>(&content) {
                Ok(data) => {
                    let table = self.translations.entry(lang.to_string()).or_default();
                    merge_tables(table, data);
                    tracing::debug!("Loaded language file: {:?}", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse language file {:?}: {}", path, e);
                }
            }
        }

        Ok(())
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get a translation by key.
    /// Key can be nested like "page.home"
    pub fn get(&self, key: &str) -> String {
        self.get_for_lang(&self.language, key)
    }

    /// Get a translation for a specific language
    pub fn get_for_lang(&self, lang: &str, key: &str) -> String {
        if let Some(lang_data) = self.translations.get(lang) {
            if let Some(value) = get_nested_value(lang_data, key) {
                return yaml_value_to_string(value);
            }
        }

        if lang != FALLBACK_LANGUAGE {
            if let Some(lang_data) = self.translations.get(FALLBACK_LANGUAGE) {
                if let Some(value) = get_nested_value(lang_data, key) {
                    return yaml_value_to_string(value);
                }
            }
        }

        // Return key as fallback
        key.to_string()
    }

    /// All translations for the current language as a flat map
    /// (e.g. "nav.home"), with fallback entries filled in
    pub fn get_all_translations(&self) -> HashMap<String, String> {
        let mut result = HashMap::new();

        if let Some(lang_data) = self.translations.get(&self.language) {
            flatten_translations(lang_data, "", &mut result);
        }

        if self.language != FALLBACK_LANGUAGE {
            if let Some(fallback) = self.translations.get(FALLBACK_LANGUAGE) {
                let mut fallback_result = HashMap::new();
                flatten_translations(fallback, "", &mut fallback_result);
                for (k, v) in fallback_result {
                    result.entry(k).or_insert(v);
                }
            }
        }

        result
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new("pt-BR")
    }
}

/// Merge `overlay` into `base`, recursing into nested mappings
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(serde_yaml::Value::Mapping(existing)), serde_yaml::Value::Mapping(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Get a nested value from a YAML map using dot notation
fn get_nested_value<'a>(data: &'a Table, key: &str) -> Option<&'a serde_yaml::Value> {
    let mut parts = key.split('.');
    let mut current = data.get(parts.next()?);

    for part in parts {
        match current {
            Some(serde_yaml::Value::Mapping(map)) => {
                current = map.get(serde_yaml::Value::String(part.to_string()));
            }
            _ => return None,
        }
    }

    current
}

/// Convert a YAML value to a string
fn yaml_value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        _ => format!("{:?}", value),
    }
}

/// Flatten translations into a HashMap with dot-notation keys
fn flatten_translations(data: &Table, prefix: &str, result: &mut HashMap<String, String>) {
    for (key, value) in data {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            serde_yaml::Value::String(s) => {
                result.insert(full_key, s.clone());
            }
            serde_yaml::Value::Number(n) => {
                result.insert(full_key, n.to_string());
            }
            serde_yaml::Value::Bool(b) => {
                result.insert(full_key, b.to_string());
            }
            serde_yaml::Value::Mapping(map) => {
                let nested: Table = map
                    .iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                    .collect();
                flatten_translations(&nested, &full_key, result);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_tables() {
        let pt = I18n::new("pt-BR");
        assert_eq!(pt.get("page.services"), "Serviços");
        assert_eq!(pt.get("page.contact"), "Contato");

        let en = I18n::new("en");
        assert_eq!(en.get("page.contact"), "Contact");
    }

    #[test]
    fn test_every_builtin_key_is_translated() {
        let pt = I18n::new("pt-BR").get_all_translations();
        let en = I18n::new("en").get_all_translations();
        let mut pt_keys: Vec<_> = pt.keys().collect();
        let mut en_keys: Vec<_> = en.keys().collect();
        pt_keys.sort();
        en_keys.sort();
        assert_eq!(pt_keys, en_keys);
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let fr = I18n::new("fr");
        assert_eq!(fr.get("nav.home"), "Home");
        assert_eq!(fr.get("page.contact"), "Contact");
    }

    #[test]
    fn test_unknown_key_returns_key() {
        let i18n = I18n::new("en");
        assert_eq!(i18n.get("nope.missing"), "nope.missing");
    }

    #[test]
    fn test_get_all_translations_flattens() {
        let all = I18n::new("en").get_all_translations();
        assert_eq!(all.get("nav.blog"), Some(&"Blog".to_string()));
        assert_eq!(all.get("contact.submit"), Some(&"Send".to_string()));
    }

    #[test]
    fn test_site_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("pt-BR.yml"),
            "home:\n  headline: Olá, mundo\n",
        )
        .unwrap();
        fs::write(tmp.path().join("broken.yml"), "home: [\n").unwrap();

        let mut i18n = I18n::new("pt-BR");
        i18n.load_languages(tmp.path()).unwrap();

        assert_eq!(i18n.get("home.headline"), "Olá, mundo");
        // Sibling keys survive the merge
        assert_eq!(i18n.get("home.lead"), "Sistemas web, automação e consultoria técnica.");
    }
}
