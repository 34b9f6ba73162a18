//! Per-language enable/disable configuration.
//!
//! Items are comma separated. `en` enables a language, `!de` disables one
//! and `*` enables everything not explicitly disabled. Any item but an
//! exclusion may carry `;key=value` parameters, e.g.
//! `en;field=name,*;field=label,!fr`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageConfiguration {
    included: BTreeMap<String, Parameters>,
    excluded: BTreeSet<String>,
    wildcard: bool,
    default_params: Option<Parameters>,
}

/// The base language of a regional code (`en-GB` → `en`).
pub fn base_language(lang: &str) -> &str {
    lang.split(['-', '_']).next().unwrap_or(lang)
}

impl LanguageConfiguration {
    /// Parse a comma separated configuration string.
    pub fn parse(config: &str) -> Result<Self> {
        let items: Vec<&str> = config.split(',').collect();
        Self::from_items(&items)
    }

    /// Parse configuration items. Items may themselves contain commas.
    pub fn from_items<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let mut conf = Self::default();
        let mut seen_any = false;

        for item in items.iter().flat_map(|i| i.as_ref().split(',')) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            seen_any = true;

            let mut parts = item.split(';');
            let lang = parts.next().unwrap_or("").trim().to_lowercase();
            let params = parse_params(parts);

            if lang == "*" {
                conf.wildcard = true;
                if !params.is_empty() {
                    if conf.default_params.is_some() {
                        return Err(Error::Config(format!(
                            "multiple default parameter configurations (item '{item}')"
                        )));
                    }
                    conf.default_params = Some(params);
                }
            } else if let Some(excluded) = lang.strip_prefix('!') {
                let excluded = excluded.trim();
                if excluded.is_empty() {
                    return Err(Error::Config(format!(
                        "missing language in exclusion '{item}'"
                    )));
                }
                if !params.is_empty() {
                    return Err(Error::Config(format!(
                        "excluded language '{excluded}' must not have parameters"
                    )));
                }
                if conf.included.contains_key(excluded) {
                    return Err(Error::Config(format!(
                        "language '{excluded}' is both included and excluded"
                    )));
                }
                conf.excluded.insert(excluded.to_string());
            } else if lang.is_empty() {
                return Err(Error::Config(format!(
                    "missing language in item '{item}'"
                )));
            } else {
                if conf.excluded.contains(&lang) {
                    return Err(Error::Config(format!(
                        "language '{lang}' is both included and excluded"
                    )));
                }
                if conf.included.insert(lang.clone(), params).is_some() {
                    return Err(Error::Config(format!(
                        "language '{lang}' is configured twice"
                    )));
                }
            }
        }

        if !seen_any {
            return Err(Error::Config("no languages configured".into()));
        }
        Ok(conf)
    }

    /// Whether processing is enabled for `lang`. `None` (unknown language)
    /// is only enabled by the wildcard.
    pub fn is_language(&self, lang: Option<&str>) -> bool {
        let Some(lang) = lang else {
            return self.wildcard;
        };
        let lang = lang.to_lowercase();
        if self.excluded.contains(&lang) {
            return false;
        }
        if self.included.contains_key(&lang) {
            return true;
        }
        let base = base_language(&lang);
        if base != lang {
            if self.excluded.contains(base) {
                return false;
            }
            if self.included.contains_key(base) {
                return true;
            }
        }
        self.wildcard
    }

    /// Parameters for `lang`: its own, then those of its base language, then
    /// the wildcard defaults. `None` when the language is not enabled.
    pub fn parameters(&self, lang: Option<&str>) -> Option<&Parameters> {
        if !self.is_language(lang) {
            return None;
        }
        if let Some(lang) = lang {
            let lang = lang.to_lowercase();
            if let Some(p) = self.included.get(&lang) {
                return Some(p);
            }
            if let Some(p) = self.included.get(base_language(&lang)) {
                return Some(p);
            }
        }
        static EMPTY: Parameters = BTreeMap::new();
        Some(self.default_params.as_ref().unwrap_or(&EMPTY))
    }

    pub fn parameter(&self, lang: Option<&str>, key: &str) -> Option<&str> {
        self.parameters(lang)?.get(key).map(String::as_str)
    }

    /// Explicitly included languages with their parameters.
    pub fn included_languages(
        &self,
    ) -> impl Iterator<Item = (&str, &Parameters)> + '_ {
        self.included.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn default_parameters(&self) -> Option<&Parameters> {
        self.default_params.as_ref()
    }
}

fn parse_params<'a>(parts: impl Iterator<Item = &'a str>) -> Parameters {
    parts
        .filter_map(|p| {
            let p = p.trim();
            if p.is_empty() {
                return None;
            }
            Some(match p.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                None => (p.to_string(), String::new()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_with_exclusion() {
        let conf = LanguageConfiguration::parse("*,!de").unwrap();
        assert!(conf.is_language(Some("en")));
        assert!(conf.is_language(Some("fr")));
        assert!(!conf.is_language(Some("de")));
        assert!(conf.is_language(None));
    }

    #[test]
    fn explicit_languages_only() {
        let conf = LanguageConfiguration::parse("en, fr").unwrap();
        assert!(conf.is_language(Some("en")));
        assert!(conf.is_language(Some("FR")));
        assert!(!conf.is_language(Some("de")));
        assert!(!conf.is_language(None));
    }

    #[test]
    fn regional_code_falls_back_to_base() {
        let conf = LanguageConfiguration::parse("en;field=name,!de").unwrap();
        assert!(conf.is_language(Some("en-GB")));
        assert!(!conf.is_language(Some("de-AT")));
        assert_eq!(conf.parameter(Some("en-GB"), "field"), Some("name"));
    }

    #[test]
    fn regional_code_overrides_base() {
        let conf = LanguageConfiguration::parse("*,!en-us").unwrap();
        assert!(conf.is_language(Some("en")));
        assert!(!conf.is_language(Some("en-US")));
    }

    #[test]
    fn parameters_and_defaults() {
        let conf =
            LanguageConfiguration::parse("en;field=name;generate,*;field=label")
                .unwrap();
        let en = conf.parameters(Some("en")).unwrap();
        assert_eq!(en.get("field").map(String::as_str), Some("name"));
        assert_eq!(en.get("generate").map(String::as_str), Some(""));
        assert_eq!(conf.parameter(Some("it"), "field"), Some("label"));
        assert!(conf.default_parameters().is_some());
    }

    #[test]
    fn disabled_language_has_no_parameters() {
        let conf = LanguageConfiguration::parse("*;field=label,!de").unwrap();
        assert!(conf.parameters(Some("de")).is_none());
    }

    #[test]
    fn included_and_excluded_is_an_error() {
        assert!(LanguageConfiguration::parse("en,!en").is_err());
        assert!(LanguageConfiguration::parse("!en,en").is_err());
    }

    #[test]
    fn excluded_with_params_is_an_error() {
        let err = LanguageConfiguration::parse("!en;field=x").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn multiple_default_params_is_an_error() {
        assert!(LanguageConfiguration::parse("*;a=1,*;b=2").is_err());
        // A bare wildcard next to a parameterised one is fine.
        assert!(LanguageConfiguration::parse("*,*;b=2").is_ok());
    }

    #[test]
    fn duplicate_language_is_an_error() {
        assert!(LanguageConfiguration::parse("en,en").is_err());
    }

    #[test]
    fn empty_configuration_is_an_error() {
        assert!(LanguageConfiguration::parse("").is_err());
        assert!(LanguageConfiguration::parse(" , ").is_err());
        let none: [&str; 0] = [];
        assert!(LanguageConfiguration::from_items(&none).is_err());
    }

    #[test]
    fn items_may_contain_commas() {
        let conf = LanguageConfiguration::from_items(&["en,de", "!fr"]).unwrap();
        let langs: Vec<_> = conf.included_languages().map(|(l, _)| l).collect();
        assert_eq!(langs, vec!["de", "en"]);
        assert!(!conf.is_wildcard());
    }

    #[test]
    fn base_language_strips_region() {
        assert_eq!(base_language("en-GB"), "en");
        assert_eq!(base_language("pt_BR"), "pt");
        assert_eq!(base_language("de"), "de");
    }
}
