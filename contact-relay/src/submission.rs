use crate::error::RelayError;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// How the body of a submission is encoded, as declared by its `Content-Type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    FormUrlEncoded,
    /// Anything else, including a missing header. Parsed as JSON.
    Other,
}

impl BodyFormat {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("application/json") {
            BodyFormat::Json
        } else if content_type.contains("application/x-www-form-urlencoded") {
            BodyFormat::FormUrlEncoded
        } else {
            BodyFormat::Other
        }
    }
}

#[derive(Debug, Error)]
pub enum BodyParseError {
    #[error("Body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON body is not an object")]
    NotAnObject,
    #[error("Body is not valid form data: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
}

/// Untyped key/value record decoded from a request body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFields(HashMap<String, String>);

impl RawFields {
    pub fn parse(format: BodyFormat, body: &[u8]) -> Result<Self, BodyParseError> {
        match format {
            BodyFormat::Json | BodyFormat::Other => Self::parse_json(body),
            BodyFormat::FormUrlEncoded => Self::parse_form(body),
        }
    }

    /// Like [`RawFields::parse`], but a body which cannot be decoded counts as
    /// an empty record. Validation then rejects it for missing fields.
    pub fn parse_lenient(format: BodyFormat, body: &[u8]) -> Self {
        match Self::parse(format, body) {
            Ok(fields) => fields,
            Err(error) => {
                warn!("Treating {format:?} request body as empty: {error}");
                Self::default()
            }
        }
    }

    fn parse_json(body: &[u8]) -> Result<Self, BodyParseError> {
        let Value::Object(object) = serde_json::from_slice(body)? else {
            return Err(BodyParseError::NotAnObject);
        };
        Ok(Self(
            object
                .into_iter()
                .map(|(key, value)| (key, coerce_to_string(value)))
                .collect(),
        ))
    }

    fn parse_form(body: &[u8]) -> Result<Self, BodyParseError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
        Ok(Self(pairs.into_iter().collect()))
    }

    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

// Only scalars carry a field value. Zero stays "0".
fn coerce_to_string(value: Value) -> String {
    match value {
        Value::String(string) => string,
        Value::Number(number) => number.to_string(),
        Value::Bool(true) => "true".into(),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// A contact form message which passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

impl ContactSubmission {
    pub fn validate(fields: &RawFields) -> Result<Self, RelayError> {
        let submission = Self {
            name: fields.get("name").trim().into(),
            email: fields.get("email").trim().into(),
            phone: fields.get("phone").trim().into(),
            message: fields.get("message").trim().into(),
        };
        if submission.name.is_empty() || submission.email.is_empty() || submission.message.is_empty()
        {
            return Err(RelayError::MissingFields);
        }
        Ok(submission)
    }
}
