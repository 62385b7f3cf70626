//! # PIX BR Code Encoder
//!
//! Builds the static PIX "BR Code" (EMV-QRCPS-MPM profile) for a charge, and
//! re-parses payloads so consumers can validate them.
//!
//! ## Payload Layout
//! ```text
//! ┌─────┬──────────────────────────────────────────────────────────────┐
//! │ Tag │ Value                                                        │
//! ├─────┼──────────────────────────────────────────────────────────────┤
//! │ 00  │ "01"                     payload format indicator            │
//! │ 26  │ ┌ 00 "BR.GOV.BCB.PIX"    merchant account information        │
//! │     │ └ 01 <pix key>           raw, never sanitized                │
//! │ 52  │ "0000"                   merchant category code              │
//! │ 53  │ "986"                    currency (BRL)                      │
//! │ 54  │ "1234.56"                amount                              │
//! │ 58  │ "BR"                     country                             │
//! │ 59  │ merchant name  (≤25)     sanitized, fallback "LOJAWEB"       │
//! │ 60  │ merchant city  (≤15)     sanitized, fallback "SAO PAULO"     │
//! │ 62  │ └ 05 <txid>    (≤25)     sanitized, fallback "LOJAWEB"       │
//! │ 63  │ CRC16 over everything up to and including "6304"            │
//! └─────┴──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every field is `tag ++ 2-digit length ++ value`, the length counting the
//! characters of the value only.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::crc16::crc16_hex;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::text::{
    sanitize_pix_text_or, MERCHANT_CITY_MAX_LEN, MERCHANT_NAME_MAX_LEN, TRANSACTION_ID_MAX_LEN,
};
use crate::types::{Charge, ChargeStatus};

/// Globally unique identifier of the PIX arrangement (tag 26/00).
pub const PIX_GUI: &str = "BR.GOV.BCB.PIX";

/// Longest PIX key the arrangement accepts (an e-mail address, 77 chars).
pub const PIX_KEY_MAX_LEN: usize = 77;

/// Third-party QR renderer the receipts point at.
pub const DEFAULT_QR_ENDPOINT: &str = "https://quickchart.io/qr?size=220&text=";

/// Receiver name stored when the shop has not configured one.
pub const DEFAULT_RECEIVER_NAME: &str = "LOJAWEB TECNOLOGIA";

/// Receiver city stored when the shop has not configured one.
pub const DEFAULT_RECEIVER_CITY: &str = "SAO PAULO";

const NAME_FALLBACK: &str = "LOJAWEB";
const CITY_FALLBACK: &str = "SAO PAULO";
const TXID_FALLBACK: &str = "LOJAWEB";

/// Field tags used by the encoder.
pub mod tags {
    pub const PAYLOAD_FORMAT: &str = "00";
    pub const MERCHANT_ACCOUNT: &str = "26";
    pub const MERCHANT_CATEGORY: &str = "52";
    pub const CURRENCY: &str = "53";
    pub const AMOUNT: &str = "54";
    pub const COUNTRY: &str = "58";
    pub const MERCHANT_NAME: &str = "59";
    pub const MERCHANT_CITY: &str = "60";
    pub const ADDITIONAL_DATA: &str = "62";
    pub const CRC: &str = "63";

    /// Sub-tags of 26.
    pub const ACCOUNT_GUI: &str = "00";
    pub const ACCOUNT_KEY: &str = "01";

    /// Sub-tag of 62.
    pub const REFERENCE_LABEL: &str = "05";
}

// =============================================================================
// Settings
// =============================================================================

/// Merchant data the encoder needs.
///
/// A `None` (or blank) key means the shop has no PIX key configured and the
/// feature is disabled: payload building yields `None`, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PixSettings {
    pub key: Option<String>,
    pub receiver_name: String,
    pub receiver_city: String,
    pub qr_endpoint: String,
}

impl Default for PixSettings {
    fn default() -> Self {
        PixSettings {
            key: None,
            receiver_name: DEFAULT_RECEIVER_NAME.to_string(),
            receiver_city: DEFAULT_RECEIVER_CITY.to_string(),
            qr_endpoint: DEFAULT_QR_ENDPOINT.to_string(),
        }
    }
}

impl PixSettings {
    /// The configured key, trimmed, if any.
    pub fn key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn is_enabled(&self) -> bool {
        self.key().is_some()
    }
}

/// A ready-to-render payment code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentCode {
    /// Copy-and-paste BR Code.
    pub payload: String,
    /// URL of the QR image for `payload`.
    pub qr_url: String,
    pub amount: Money,
}

// =============================================================================
// Encoder
// =============================================================================

/// Encodes one TLV field.
///
/// Values must be at most 99 characters; every caller in this module bounds
/// its inputs accordingly.
///
/// ```rust
/// use loja_core::pix::tlv;
///
/// assert_eq!(tlv("58", "BR"), "5802BR");
/// assert_eq!(tlv("59", "LOJAWEB"), "5907LOJAWEB");
/// ```
pub fn tlv(id: &str, value: &str) -> String {
    let len = value.chars().count();
    debug_assert!(len <= 99, "TLV value too long for a 2-digit length");
    format!("{}{:02}{}", id, len, value)
}

/// Builds the BR Code for `amount`.
///
/// ## Returns
/// * `Ok(Some(payload))` - encoded payload with CRC
/// * `Ok(None)` - no PIX key configured (feature unavailable)
/// * `Err(..)` - negative amount, or key longer than 77 characters
///
/// ## Example
/// ```rust
/// use loja_core::money::Money;
/// use loja_core::pix::{build_payload, PixSettings};
///
/// let settings = PixSettings {
///     key: Some("11999999999".to_string()),
///     receiver_name: "LOJAWEB".to_string(),
///     receiver_city: "SAO PAULO".to_string(),
///     ..PixSettings::default()
/// };
/// let payload = build_payload(Money::from_cents(1000), "VEN1", &settings)
///     .unwrap()
///     .unwrap();
/// assert!(payload.ends_with("63048FAA"));
/// ```
pub fn build_payload(
    amount: Money,
    transaction_id: &str,
    settings: &PixSettings,
) -> CoreResult<Option<String>> {
    let Some(key) = settings.key() else {
        return Ok(None);
    };

    if key.chars().count() > PIX_KEY_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "pix key".to_string(),
            max: PIX_KEY_MAX_LEN,
        }
        .into());
    }

    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        }
        .into());
    }

    let merchant_name =
        sanitize_pix_text_or(&settings.receiver_name, MERCHANT_NAME_MAX_LEN, NAME_FALLBACK);
    let merchant_city =
        sanitize_pix_text_or(&settings.receiver_city, MERCHANT_CITY_MAX_LEN, CITY_FALLBACK);
    let txid = sanitize_pix_text_or(transaction_id, TRANSACTION_ID_MAX_LEN, TXID_FALLBACK);

    let merchant_account = [
        tlv(tags::ACCOUNT_GUI, PIX_GUI),
        tlv(tags::ACCOUNT_KEY, key),
    ]
    .concat();

    let mut payload = [
        tlv(tags::PAYLOAD_FORMAT, "01"),
        tlv(tags::MERCHANT_ACCOUNT, &merchant_account),
        tlv(tags::MERCHANT_CATEGORY, "0000"),
        tlv(tags::CURRENCY, "986"),
        tlv(tags::AMOUNT, &amount.to_decimal_string()),
        tlv(tags::COUNTRY, "BR"),
        tlv(tags::MERCHANT_NAME, &merchant_name),
        tlv(tags::MERCHANT_CITY, &merchant_city),
        tlv(tags::ADDITIONAL_DATA, &tlv(tags::REFERENCE_LABEL, &txid)),
        format!("{}04", tags::CRC),
    ]
    .concat();

    let crc = crc16_hex(payload.as_bytes());
    payload.push_str(&crc);

    Ok(Some(payload))
}

/// QR image URL on the default renderer.
pub fn build_qr_url(payload: Option<&str>) -> Option<String> {
    build_qr_url_with(DEFAULT_QR_ENDPOINT, payload)
}

/// QR image URL on `endpoint`; the whole payload is percent-encoded, only
/// RFC 3986 unreserved characters are left as-is.
///
/// ```rust
/// use loja_core::pix::build_qr_url_with;
///
/// let url = build_qr_url_with("https://qr.local/?t=", Some("5909SAO PAULO")).unwrap();
/// assert_eq!(url, "https://qr.local/?t=5909SAO%20PAULO");
/// assert_eq!(build_qr_url_with("https://qr.local/?t=", Some("")), None);
/// ```
pub fn build_qr_url_with(endpoint: &str, payload: Option<&str>) -> Option<String> {
    let payload = payload.filter(|p| !p.is_empty())?;
    Some(format!("{}{}", endpoint, urlencoding::encode(payload)))
}

/// Payment code for what is still owed on `charge`.
///
/// The outstanding balance is the amount and the charge reference is the
/// transaction id. Returns `None` when PIX is disabled, the charge is
/// cancelled, or nothing is owed.
pub fn payment_code_for_charge(
    charge: &Charge,
    settings: &PixSettings,
) -> CoreResult<Option<PaymentCode>> {
    if charge.status == ChargeStatus::Cancelled {
        return Ok(None);
    }

    let amount = charge.balance();
    if !amount.is_positive() {
        return Ok(None);
    }

    let Some(payload) = build_payload(amount, &charge.reference, settings)? else {
        return Ok(None);
    };

    let qr_url = build_qr_url_with(&settings.qr_endpoint, Some(&payload)).unwrap_or_default();
    Ok(Some(PaymentCode {
        payload,
        qr_url,
        amount,
    }))
}

// =============================================================================
// Decoder
// =============================================================================

/// One decoded TLV field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvField {
    pub id: String,
    pub value: String,
}

impl TlvField {
    /// Decodes `value` as nested TLV (templates 26 and 62).
    pub fn children(&self) -> CoreResult<Vec<TlvField>> {
        parse_tlv(&self.value)
    }
}

fn malformed(reason: impl Into<String>) -> CoreError {
    CoreError::MalformedPayload {
        reason: reason.into(),
    }
}

/// Splits a TLV string into fields. Lengths are strict: any truncated header
/// or value is an error.
pub fn parse_tlv(input: &str) -> CoreResult<Vec<TlvField>> {
    let chars: Vec<char> = input.chars().collect();
    let mut fields = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if pos + 4 > chars.len() {
            return Err(malformed(format!("truncated header at {}", pos)));
        }

        let id: String = chars[pos..pos + 2].iter().collect();
        let len_text: String = chars[pos + 2..pos + 4].iter().collect();
        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed(format!("invalid tag '{}' at {}", id, pos)));
        }
        let len: usize = len_text
            .parse()
            .map_err(|_| malformed(format!("invalid length '{}' for tag {}", len_text, id)))?;

        let start = pos + 4;
        let end = start + len;
        if end > chars.len() {
            return Err(malformed(format!("value of tag {} overruns payload", id)));
        }

        fields.push(TlvField {
            id,
            value: chars[start..end].iter().collect(),
        });
        pos = end;
    }

    Ok(fields)
}

/// Checks that `payload` ends in `6304` plus the correct CRC.
pub fn verify_payload(payload: &str) -> bool {
    let Some(split) = payload.len().checked_sub(4) else {
        return false;
    };
    let (Some(body), Some(crc)) = (payload.get(..split), payload.get(split..)) else {
        return false;
    };

    body.ends_with("6304") && crc16_hex(body.as_bytes()).eq_ignore_ascii_case(crc)
}

/// Decodes a full BR Code, rejecting payloads with a bad checksum or without
/// the trailing CRC field.
pub fn parse_payload(payload: &str) -> CoreResult<Vec<TlvField>> {
    if !verify_payload(payload) {
        return Err(malformed("checksum mismatch"));
    }

    let fields = parse_tlv(payload)?;
    match fields.last() {
        Some(last) if last.id == tags::CRC && last.value.len() == 4 => Ok(fields),
        _ => Err(malformed("CRC field must be last")),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GOLDEN: &str = "00020126330014BR.GOV.BCB.PIX0111119999999995204000053039865405\
10.005802BR5907LOJAWEB6009SAO PAULO62080504VEN163048FAA";

    fn settings(key: &str, name: &str, city: &str) -> PixSettings {
        PixSettings {
            key: Some(key.to_string()),
            receiver_name: name.to_string(),
            receiver_city: city.to_string(),
            ..PixSettings::default()
        }
    }

    #[test]
    fn test_golden_payload() {
        let payload = build_payload(
            Money::from_cents(1000),
            "VEN1",
            &settings("11999999999", "LOJAWEB", "SAO PAULO"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(payload, GOLDEN);
        assert!(verify_payload(&payload));
    }

    #[test]
    fn test_payload_sanitizes_display_fields_only() {
        let payload = build_payload(
            Money::from_cents(123456),
            "Cobrança #42",
            &settings("lojaweb@example.com", "João da Silva Ltda.", "Brasília"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            payload,
            "00020126410014BR.GOV.BCB.PIX0119lojaweb@example.com52040000530398654071234.56\
5802BR5918JOAO DA SILVA LTDA6008BRASILIA62150511COBRANCA 4263043D55"
        );
    }

    #[test]
    fn test_fallbacks_when_text_sanitizes_to_empty() {
        let payload = build_payload(
            Money::zero(),
            "***",
            &settings("+5511999999999", "...", "!!!"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            payload,
            "00020126360014BR.GOV.BCB.PIX0114+551199999999952040000530398654040.00\
5802BR5907LOJAWEB6009SAO PAULO62110507LOJAWEB6304A16A"
        );
    }

    #[test]
    fn test_missing_key_disables_feature() {
        let mut cfg = PixSettings::default();
        assert_eq!(build_payload(Money::from_cents(100), "X", &cfg).unwrap(), None);

        cfg.key = Some("   ".to_string());
        assert!(!cfg.is_enabled());
        assert_eq!(build_payload(Money::from_cents(100), "X", &cfg).unwrap(), None);
    }

    #[test]
    fn test_rejects_oversized_key_and_negative_amount() {
        let long_key = format!("{}@example.com", "a".repeat(70));
        let err = build_payload(Money::from_cents(100), "X", &settings(&long_key, "A", "B"));
        assert!(matches!(
            err,
            Err(CoreError::Validation(ValidationError::TooLong { .. }))
        ));

        let err = build_payload(Money::from_cents(-1), "X", &settings("k", "A", "B"));
        assert!(matches!(
            err,
            Err(CoreError::Validation(ValidationError::MustNotBeNegative { .. }))
        ));
    }

    #[test]
    fn test_field_order_survives_reparse() {
        let fields = parse_payload(GOLDEN).unwrap();
        let ids: Vec<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["00", "26", "52", "53", "54", "58", "59", "60", "62", "63"]
        );

        let account = fields[1].children().unwrap();
        assert_eq!(account[0].value, PIX_GUI);
        assert_eq!(account[1].value, "11999999999");

        let additional = fields[8].children().unwrap();
        assert_eq!(additional[0].id, "05");
        assert_eq!(additional[0].value, "VEN1");
        assert_eq!(fields[9].value, "8FAA");
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let tampered = GOLDEN.replace("10.00", "99.00");
        assert!(!verify_payload(&tampered));
        assert!(matches!(
            parse_payload(&tampered),
            Err(CoreError::MalformedPayload { .. })
        ));
        assert!(!verify_payload("63"));
    }

    #[test]
    fn test_parse_tlv_rejects_truncation() {
        assert!(parse_tlv("5910LOJA").is_err());
        assert!(parse_tlv("59").is_err());
        assert!(parse_tlv("59AB").is_err());
        assert_eq!(parse_tlv("").unwrap(), vec![]);
    }

    #[test]
    fn test_qr_url_escapes_everything_reserved() {
        let url = build_qr_url(Some(GOLDEN)).unwrap();
        assert_eq!(
            url,
            "https://quickchart.io/qr?size=220&text=00020126330014BR.GOV.BCB.PIX01111199999999952040000\
5303986540510.005802BR5907LOJAWEB6009SAO%20PAULO62080504VEN163048FAA"
        );

        let url = build_qr_url(Some("a+b@c/d?e=f&g")).unwrap();
        assert!(url.ends_with("a%2Bb%40c%2Fd%3Fe%3Df%26g"));

        assert_eq!(build_qr_url(None), None);
    }
}
