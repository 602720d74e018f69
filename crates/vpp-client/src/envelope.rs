//! Envelope codec.
//!
//! Every VPP response is a flat JSON object carrying a `status` discriminant
//! (`0` success, `-1` failure) next to either payload fields or
//! `errorNumber`/`errorMessage`. Decoding reads the discriminant first and
//! only decodes the payload on success, so a failed envelope never exposes
//! its payload even when one is present.

use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DomainError;

/// Content type sent and accepted on every call.
pub const MEDIA_TYPE: &str = "application/json;charset=UTF8";

const STATUS_OK: i64 = 0;
const STATUS_ERR: i64 = -1;

/// A decoded response: the payload, or the service-reported error.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Ok(T),
    Err(DomainError),
}

impl<T> Envelope<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn into_result(self) -> Result<T, DomainError> {
        match self {
            Self::Ok(payload) => Ok(payload),
            Self::Err(err) => Err(err),
        }
    }
}

/// Request body with the session token attached next to the typed fields.
#[derive(Debug, Serialize)]
pub(crate) struct Authenticated<'a, T: Serialize> {
    #[serde(flatten)]
    pub body: &'a T,
    #[serde(rename = "sToken")]
    pub s_token: &'a str,
}

/// Body for operations that take nothing but the session token.
#[derive(Debug, Default, Serialize)]
pub struct NoParams {}

/// Serialize a request to compact JSON bytes.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Decode a response body into an [`Envelope`].
///
/// A missing `status` field is treated as success. Any status other than
/// `0` or `-1` is a decode error.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    let Value::Object(mut fields) = value else {
        return Err(serde_json::Error::custom("response envelope is not a JSON object"));
    };

    match take_status(&mut fields)? {
        STATUS_ERR => Ok(Envelope::Err(domain_error(&fields))),
        _ => serde_json::from_value(Value::Object(fields)).map(Envelope::Ok),
    }
}

fn take_status(fields: &mut Map<String, Value>) -> Result<i64, serde_json::Error> {
    match fields.remove("status") {
        None | Some(Value::Null) => Ok(STATUS_OK),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(s @ (STATUS_OK | STATUS_ERR)) => Ok(s),
            _ => Err(serde_json::Error::custom(format!("unexpected envelope status {n}"))),
        },
        Some(other) => Err(serde_json::Error::custom(format!(
            "envelope status must be an integer, got {other}"
        ))),
    }
}

fn domain_error(fields: &Map<String, Value>) -> DomainError {
    let code = fields.get("errorNumber").and_then(Value::as_i64).unwrap_or_default();
    let message = fields
        .get("errorMessage")
        .and_then(Value::as_str)
        .unwrap_or("service reported failure without detail")
        .to_string();
    DomainError { code, message }
}
