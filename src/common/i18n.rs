// src/common/i18n.rs

use std::collections::HashMap;

// Idioma usado quando a tradução pedida não existe
pub const FALLBACK_LOCALE: &str = "pt";

/// Catálogo de mensagens por idioma, carregado uma vez na inicialização
/// e compartilhado pelo `AppState`.
#[derive(Debug, Clone)]
pub struct I18nStore {
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    // Catálogos embutidos no binário (pasta locales/)
    pub fn bundled() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        catalogs.insert(
            "pt".to_string(),
            serde_json::from_str(include_str!("../../locales/pt.json"))?,
        );
        catalogs.insert(
            "en".to_string(),
            serde_json::from_str(include_str!("../../locales/en.json"))?,
        );
        Ok(Self { catalogs })
    }

    pub fn translate(&self, locale: &str, key: &str) -> String {
        self.catalogs
            .get(locale)
            .and_then(|catalog| catalog.get(key))
            .or_else(|| {
                self.catalogs
                    .get(FALLBACK_LOCALE)
                    .and_then(|catalog| catalog.get(key))
            })
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_locale_falls_back_to_portuguese() {
        let store = I18nStore::bundled().unwrap();
        assert_eq!(
            store.translate("de", "contract_not_found"),
            store.translate("pt", "contract_not_found")
        );
    }

    #[test]
    fn unknown_key_is_returned_verbatim() {
        let store = I18nStore::bundled().unwrap();
        assert_eq!(store.translate("en", "no_such_key"), "no_such_key");
    }

    #[test]
    fn catalogs_share_the_same_keys() {
        let store = I18nStore::bundled().unwrap();
        let mut pt: Vec<_> = store.catalogs["pt"].keys().collect();
        let mut en: Vec<_> = store.catalogs["en"].keys().collect();
        pt.sort();
        en.sort();
        assert_eq!(pt, en);
    }
}
