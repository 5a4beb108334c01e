// src/common/i18n.rs

use std::collections::HashMap;

pub const DEFAULT_LANGUAGE: &str = "pt";

// Catálogos embutidos no binário; a chave é o código do erro.
const CATALOGS: &[(&str, &str)] = &[
    ("pt", include_str!("../../locales/pt.json")),
    ("en", include_str!("../../locales/en.json")),
];

#[derive(Debug, Clone, Default)]
pub struct I18nStore {
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in CATALOGS {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Catálogo '{}' inválido: {}", lang, e))?;
            catalogs.insert(lang.to_string(), messages);
        }
        Ok(Self { catalogs })
    }

    /// Store sem mensagens: `translate` sempre devolve `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Procura a mensagem no idioma pedido e cai para o português.
    pub fn translate(&self, lang: &str, key: &str) -> Option<&str> {
        self.catalogs
            .get(lang)
            .and_then(|c| c.get(key))
            .or_else(|| self.catalogs.get(DEFAULT_LANGUAGE).and_then(|c| c.get(key)))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_portuguese() {
        let store = I18nStore::load().unwrap();
        assert_eq!(
            store.translate("de", "forbidden"),
            Some("Você não tem permissão para realizar esta ação.")
        );
    }

    #[test]
    fn catalogs_have_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let pt = &store.catalogs["pt"];
        let en = &store.catalogs["en"];
        for key in pt.keys() {
            assert!(en.contains_key(key), "chave '{}' faltando em en.json", key);
        }
    }

    #[test]
    fn empty_store_translates_nothing() {
        assert!(I18nStore::empty().translate("pt", "forbidden").is_none());
    }
}
