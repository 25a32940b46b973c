//! Query language handling.
//!
//! The embedding model was trained on English captions. Queries in other
//! scripts are passed through a [`QueryTranslator`] first.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use dejavu_core::{QueryTranslator, Result};

/// Latin letters, digits, punctuation and whitespace only.
static LATIN_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{Latin}\p{Common}\p{Inherited}]*$").expect("valid regex"));

/// Whether a query can go to the model as is.
pub fn is_latin(text: &str) -> bool {
    LATIN_ONLY.is_match(text)
}

/// Translate `query` when it is not written in Latin script.
pub async fn prepare_query(translator: &dyn QueryTranslator, query: &str) -> Result<String> {
    let query = query.trim();
    if is_latin(query) {
        return Ok(query.to_string());
    }
    let translated = translator.translate(query).await?;
    debug!(
        subsystem = "inference",
        component = "language",
        op = "translate",
        query,
        translated = %translated,
        "Translated non-Latin query"
    );
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl QueryTranslator for Upper {
        async fn translate(&self, text: &str) -> Result<String> {
            Ok(format!("translated:{}", text))
        }
    }

    #[test]
    fn test_is_latin() {
        assert!(is_latin("a cat on a sofa"));
        assert!(is_latin("café, 2 dogs!"));
        assert!(is_latin(""));
        assert!(!is_latin("кіт на дивані"));
        assert!(!is_latin("猫"));
        assert!(!is_latin("cat кіт"));
    }

    #[tokio::test]
    async fn test_prepare_query_only_translates_non_latin() {
        assert_eq!(prepare_query(&Upper, " red car ").await.unwrap(), "red car");
        assert_eq!(
            prepare_query(&Upper, "червона машина").await.unwrap(),
            "translated:червона машина"
        );
    }
}
