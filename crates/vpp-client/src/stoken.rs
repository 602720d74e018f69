//! Session token inspection.
//!
//! The sToken downloaded from the VPP portal is base64 text wrapping a small
//! JSON document:
//!
//! ```text
//! {"token":"...","expDate":"2027-03-01T10:00:00-0800","orgName":"Example Org"}
//! ```
//!
//! The client sends the token text as-is; decoding is only needed to show
//! the organisation and warn before expiry.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Decoded contents of a session token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SToken {
    pub token: String,
    pub exp_date: String,
    pub org_name: String,
}

impl std::fmt::Debug for SToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SToken")
            .field("token", &"[REDACTED]")
            .field("exp_date", &self.exp_date)
            .field("org_name", &self.org_name)
            .finish()
    }
}

impl SToken {
    /// Decode the base64 token text.
    pub fn decode(encoded: &str) -> Result<Self, ConfigError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::InvalidToken(format!("not base64: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| ConfigError::InvalidToken(format!("not a token document: {e}")))
    }

    /// Encode back to the base64 text form the service accepts.
    pub fn encode(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|e| ConfigError::InvalidToken(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Expiry instant. Accepts RFC 3339 and the `-0800` offset form the portal emits.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, ConfigError> {
        DateTime::parse_from_rfc3339(&self.exp_date)
            .or_else(|_| DateTime::parse_from_str(&self.exp_date, "%Y-%m-%dT%H:%M:%S%z"))
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ConfigError::InvalidToken(format!("expDate {:?}: {e}", self.exp_date)))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool, ConfigError> {
        Ok(self.expires_at()? <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> SToken {
        SToken {
            token: "abc123".into(),
            exp_date: "2027-03-01T10:00:00-0800".into(),
            org_name: "Example Org".into(),
        }
    }

    #[test]
    fn encode_decode_preserves_fields() {
        let text = sample().encode().unwrap();
        assert_eq!(SToken::decode(&text).unwrap(), sample());
    }

    #[test]
    fn decodes_portal_document() {
        let text = STANDARD.encode(br#"{"token":"t","expDate":"2027-03-01T10:00:00-0800","orgName":"Acme"}"#);
        let token = SToken::decode(&format!("{text}\n")).unwrap();
        assert_eq!(token.org_name, "Acme");
        assert_eq!(
            token.expires_at().unwrap(),
            Utc.with_ymd_and_hms(2027, 3, 1, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn expiry_check() {
        let token = sample();
        assert!(!token
            .is_expired_at(Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap())
            .unwrap());
        assert!(token
            .is_expired_at(Utc.with_ymd_and_hms(2027, 3, 2, 0, 0, 0).unwrap())
            .unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(SToken::decode("%%%"), Err(ConfigError::InvalidToken(_))));
        let not_json = STANDARD.encode(b"hello");
        assert!(matches!(SToken::decode(&not_json), Err(ConfigError::InvalidToken(_))));
    }

    #[test]
    fn debug_hides_token() {
        assert!(!format!("{:?}", sample()).contains("abc123"));
    }
}
