//! # PIX Text Sanitizer
//!
//! The BR Code text fields (merchant name, merchant city, transaction id)
//! only accept a restricted alphabet, and banking apps reject payloads with
//! accents or punctuation.
//!
//! ```text
//! "João da Silva Ltda."
//!      │  NFKD          "Joa\u{303}o da Silva Ltda."
//!      │  drop non-ASCII "Joao da Silva Ltda."
//!      │  keep [A-Za-z0-9 ], trim, upper
//!      ▼
//! "JOAO DA SILVA LTDA" ──► truncate(max_len)
//! ```

use unicode_normalization::UnicodeNormalization;

/// Maximum length of the merchant name field (tag 59).
pub const MERCHANT_NAME_MAX_LEN: usize = 25;

/// Maximum length of the merchant city field (tag 60).
pub const MERCHANT_CITY_MAX_LEN: usize = 15;

/// Maximum length of the transaction id field (tag 62/05).
pub const TRANSACTION_ID_MAX_LEN: usize = 25;

/// Folds `value` to upper-case ASCII letters, digits and spaces, capped at
/// `max_len` characters.
///
/// ## Example
/// ```rust
/// use loja_core::text::sanitize_pix_text;
///
/// assert_eq!(sanitize_pix_text("João da Silva Ltda.", 10), "JOAO DA SI");
/// assert_eq!(sanitize_pix_text("São Paulo - SP", 15), "SAO PAULO  SP");
/// ```
pub fn sanitize_pix_text(value: &str, max_len: usize) -> String {
    let folded: String = value
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();

    folded
        .trim()
        .to_ascii_uppercase()
        .chars()
        .take(max_len)
        .collect()
}

/// Like [`sanitize_pix_text`], falling back to `fallback` when nothing
/// survives sanitization.
pub fn sanitize_pix_text_or(value: &str, max_len: usize, fallback: &str) -> String {
    let sanitized = sanitize_pix_text(value, max_len);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accents_punctuation_and_truncation() {
        assert_eq!(sanitize_pix_text("João da Silva Ltda.", 10), "JOAO DA SI");
        assert_eq!(
            sanitize_pix_text("Açaí & Cia. Comércio", 25),
            "ACAI  CIA COMERCIO"
        );
    }

    #[test]
    fn test_trims_before_truncating() {
        assert_eq!(sanitize_pix_text("   brasília  ", 15), "BRASILIA");
        assert_eq!(sanitize_pix_text("!!ab", 25), "AB");
    }

    #[test]
    fn test_drops_non_latin_scripts() {
        assert_eq!(sanitize_pix_text("東京", 15), "");
        assert_eq!(sanitize_pix_text("ﬁat", 15), "FIAT");
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long = "a".repeat(40);
        assert_eq!(sanitize_pix_text(&long, MERCHANT_NAME_MAX_LEN).len(), 25);
        assert_eq!(sanitize_pix_text(&long, MERCHANT_CITY_MAX_LEN).len(), 15);
    }

    #[test]
    fn test_fallback_when_empty() {
        assert_eq!(sanitize_pix_text_or("---", 25, "LOJAWEB"), "LOJAWEB");
        assert_eq!(sanitize_pix_text_or("venda 1", 25, "LOJAWEB"), "VENDA 1");
    }
}
