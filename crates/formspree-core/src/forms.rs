//! Submission data and the server's response envelopes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::transport::ResponseMeta;

/// A single part of a multipart submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartValue {
    Text(String),
    File {
        file_name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// A named multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

/// Ordered multipart container. Repeated names are allowed, as in an HTML form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    parts: Vec<FormPart>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style text part.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Builder-style file part.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: PartValue::File {
                file_name: file_name.into(),
                mime_type: mime_type.map(String::from),
                bytes,
            },
        });
        self
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(FormPart {
            name: name.into(),
            value: PartValue::Text(value.into()),
        });
    }

    /// First text value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match &p.value {
            PartValue::Text(v) if p.name == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormPart> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Data for one submission: a multipart container or a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionData {
    Json(Map<String, Value>),
    Multipart(FormFields),
}

impl SubmissionData {
    /// Wrap a JSON value. Only objects are accepted.
    pub fn from_json(value: Value) -> Result<Self, ClientError> {
        match value {
            Value::Object(map) => Ok(Self::Json(map)),
            other => Err(ClientError::InvalidData(format!(
                "submission data must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// A copy of this data with one extra text field. `self` is untouched.
    pub fn with_field(&self, key: &str, value: &str) -> Self {
        self.with_fields([(key, value)])
    }

    /// A copy of this data with extra text fields appended in order.
    pub fn with_fields<'a>(&self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut copy = self.clone();
        for (key, value) in fields {
            match &mut copy {
                Self::Json(map) => {
                    map.insert(key.to_string(), Value::String(value.to_string()));
                }
                Self::Multipart(form) => form.append(key, value),
            }
        }
        copy
    }
}

impl Default for SubmissionData {
    fn default() -> Self {
        Self::Json(Map::new())
    }
}

impl From<Map<String, Value>> for SubmissionData {
    fn from(map: Map<String, Value>) -> Self {
        Self::Json(map)
    }
}

impl From<FormFields> for SubmissionData {
    fn from(form: FormFields) -> Self {
        Self::Multipart(form)
    }
}

/// Error codes reported by the server or synthesized by the payment flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    Blocked,
    Empty,
    FilesTooBig,
    FormNotFound,
    Inactive,
    NoFileUploads,
    ProjectNotFound,
    TooManyFiles,
    RequiredFieldEmpty,
    RequiredFieldMissing,
    /// The payment provider refused to create a payment method.
    StripeClientError,
    /// The SCA challenge failed on the client.
    StripeScaError,
    TypeEmail,
    TypeNumeric,
    TypeText,
    /// The payment flow received a response it could not act on.
    Unspecified,
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blocked => "BLOCKED",
            Self::Empty => "EMPTY",
            Self::FilesTooBig => "FILES_TOO_BIG",
            Self::FormNotFound => "FORM_NOT_FOUND",
            Self::Inactive => "INACTIVE",
            Self::NoFileUploads => "NO_FILE_UPLOADS",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::TooManyFiles => "TOO_MANY_FILES",
            Self::RequiredFieldEmpty => "REQUIRED_FIELD_EMPTY",
            Self::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            Self::StripeClientError => "STRIPE_CLIENT_ERROR",
            Self::StripeScaError => "STRIPE_SCA_ERROR",
            Self::TypeEmail => "TYPE_EMAIL",
            Self::TypeNumeric => "TYPE_NUMERIC",
            Self::TypeText => "TYPE_TEXT",
            Self::Unspecified => "UNSPECIFIED",
            Self::Other(code) => code,
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "BLOCKED" => Self::Blocked,
            "EMPTY" => Self::Empty,
            "FILES_TOO_BIG" => Self::FilesTooBig,
            "FORM_NOT_FOUND" => Self::FormNotFound,
            "INACTIVE" => Self::Inactive,
            "NO_FILE_UPLOADS" => Self::NoFileUploads,
            "PROJECT_NOT_FOUND" => Self::ProjectNotFound,
            "TOO_MANY_FILES" => Self::TooManyFiles,
            "REQUIRED_FIELD_EMPTY" => Self::RequiredFieldEmpty,
            "REQUIRED_FIELD_MISSING" => Self::RequiredFieldMissing,
            "STRIPE_CLIENT_ERROR" => Self::StripeClientError,
            "STRIPE_SCA_ERROR" => Self::StripeScaError,
            "TYPE_EMAIL" => Self::TypeEmail,
            "TYPE_NUMERIC" => Self::TypeNumeric,
            "TYPE_TEXT" => Self::TypeText,
            "UNSPECIFIED" => Self::Unspecified,
            _ => Self::Other(code),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

/// A field-scoped or form-scoped error.
///
/// A typed view only. The exact wire object lives in the enclosing
/// [`SubmissionBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormError {
    /// A form-level error.
    pub fn form(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: None,
            code: Some(code),
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Field errors are attached to a specific input.
    pub fn is_field_error(&self) -> bool {
        self.field.is_some()
    }

    /// Wire form of an error built on the client side.
    pub fn to_value(&self) -> Value {
        let mut obj = self.extra.clone();
        if let Some(field) = &self.field {
            obj.insert("field".to_string(), Value::String(field.clone()));
        }
        if let Some(code) = &self.code {
            obj.insert("code".to_string(), Value::String(code.as_str().to_string()));
        }
        obj.insert("message".to_string(), Value::String(self.message.clone()));
        Value::Object(obj)
    }
}

/// `{ id, data }`, plus the `ok`/`next` markers newer servers send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{ errors: [...] }` with at least one error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub errors: Vec<FormError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorBody {
    pub fn single(error: FormError) -> Self {
        Self {
            errors: vec![error],
            extra: Map::new(),
        }
    }

    /// Errors attached to the named field.
    pub fn field_errors<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FormError> {
        self.errors
            .iter()
            .filter(move |e| e.field.as_deref() == Some(field))
    }

    /// Errors that apply to the submission as a whole.
    pub fn form_errors(&self) -> impl Iterator<Item = &FormError> {
        self.errors.iter().filter(|e| !e.is_field_error())
    }
}

/// A decoded response body, classified once at the deserialization boundary.
///
/// Every variant keeps the body exactly as decoded; the typed views are for
/// inspection only and serialization always emits `raw`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionBody {
    Success { body: SuccessBody, raw: Value },
    Error { body: ErrorBody, raw: Value },
    /// Neither envelope. Kept verbatim so newer server shapes reach the caller.
    Unrecognized(Value),
}

impl SubmissionBody {
    /// Classify a decoded JSON body. Never fails.
    ///
    /// A non-empty `errors` array wins over `id`.
    pub fn from_value(value: Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Unrecognized(value);
        };

        let has_errors = obj
            .get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| !errors.is_empty());

        if has_errors {
            if let Ok(body) = ErrorBody::deserialize(&value) {
                return Self::Error { body, raw: value };
            }
        } else if obj.get("id").is_some_and(|id| !id.is_null()) {
            if let Ok(body) = SuccessBody::deserialize(&value) {
                return Self::Success { body, raw: value };
            }
        }

        Self::Unrecognized(value)
    }

    /// Error envelope around a single client-side error.
    pub fn error(error: FormError) -> Self {
        let raw = serde_json::json!({ "errors": [error.to_value()] });
        Self::Error {
            body: ErrorBody::single(error),
            raw,
        }
    }

    /// Error envelope around a single error object received from the server.
    /// `raw_error` is placed in the envelope untouched.
    pub(crate) fn server_error(error: FormError, raw_error: Value) -> Self {
        Self::Error {
            body: ErrorBody::single(error),
            raw: serde_json::json!({ "errors": [raw_error] }),
        }
    }

    pub fn has_errors(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn as_errors(&self) -> Option<&ErrorBody> {
        match self {
            Self::Error { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn as_success(&self) -> Option<&SuccessBody> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The body as it came off the wire.
    pub fn raw(&self) -> &Value {
        match self {
            Self::Success { raw, .. } | Self::Error { raw, .. } | Self::Unrecognized(raw) => raw,
        }
    }

    pub fn to_value(&self) -> Value {
        self.raw().clone()
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Success { raw, .. } | Self::Error { raw, .. } | Self::Unrecognized(raw) => raw,
        }
    }
}

impl Serialize for SubmissionBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SubmissionBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// What `submit_form` resolves to.
///
/// `response` is `None` when the flow ended before anything reached the
/// network (the payment method could not be created).
#[derive(Debug, Clone)]
pub struct SubmissionResponse {
    pub body: SubmissionBody,
    pub response: Option<ResponseMeta>,
}

impl SubmissionResponse {
    pub(crate) fn failed(error: FormError, response: Option<ResponseMeta>) -> Self {
        Self {
            body: SubmissionBody::error(error),
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let body = SubmissionBody::from_value(json!({ "id": "xxx", "data": { "email": "a@b.c" } }));
        let success = body.as_success().expect("success envelope");
        assert_eq!(success.id.as_deref(), Some("xxx"));
        assert_eq!(success.data, Some(json!({ "email": "a@b.c" })));
        assert!(!body.has_errors());
    }

    #[test]
    fn test_error_envelope_with_field_and_form_errors() {
        let body = SubmissionBody::from_value(json!({
            "errors": [
                { "field": "email", "code": "TYPE_EMAIL", "message": "should be an email" },
                { "code": "EMPTY", "message": "empty form" },
                { "message": "something else" }
            ]
        }));
        let errors = body.as_errors().expect("error envelope");
        assert_eq!(errors.errors.len(), 3);

        let email: Vec<_> = errors.field_errors("email").collect();
        assert_eq!(email.len(), 1);
        assert_eq!(email[0].code, Some(ErrorCode::TypeEmail));
        assert!(email[0].is_field_error());

        let form: Vec<_> = errors.form_errors().collect();
        assert_eq!(form.len(), 2);
        assert_eq!(form[0].code, Some(ErrorCode::Empty));
        assert_eq!(form[1].code, None);
    }

    #[test]
    fn test_errors_take_precedence_over_id() {
        let body = SubmissionBody::from_value(json!({
            "id": "xxx",
            "errors": [{ "code": "BLOCKED", "message": "blocked" }]
        }));
        assert!(body.has_errors());
    }

    #[test]
    fn test_empty_errors_is_unrecognized() {
        let raw = json!({ "errors": [] });
        assert_eq!(
            SubmissionBody::from_value(raw.clone()),
            SubmissionBody::Unrecognized(raw)
        );
    }

    #[test]
    fn test_unknown_shapes_pass_through() {
        for raw in [json!({ "foo": "bar" }), json!([1, 2]), json!("text"), json!(null)] {
            let body = SubmissionBody::from_value(raw.clone());
            assert_eq!(body, SubmissionBody::Unrecognized(raw.clone()));
            assert_eq!(body.to_value(), raw);
        }
    }

    #[test]
    fn test_unknown_error_code_is_preserved() {
        let raw = json!({ "errors": [{ "code": "SOME_NEW_CODE", "message": "m" }] });
        let body = SubmissionBody::from_value(raw.clone());
        assert_eq!(
            body.as_errors().unwrap().errors[0].code,
            Some(ErrorCode::Other("SOME_NEW_CODE".to_string()))
        );
        assert_eq!(body.to_value(), raw);
    }

    #[test]
    fn test_success_keeps_extra_keys() {
        let raw = json!({ "id": "1", "data": {}, "next": "https://x", "extra": 5 });
        let body = SubmissionBody::from_value(raw.clone());
        assert_eq!(body.to_value(), raw);
    }

    #[test]
    fn test_error_envelope_round_trips_exactly() {
        let raw = json!({
            "errors": [{ "field": null, "code": null, "message": "m", "hint": "x" }]
        });
        let body = SubmissionBody::from_value(raw.clone());
        let errors = body.as_errors().expect("error envelope");
        assert_eq!(errors.errors[0].code, None);
        assert_eq!(errors.errors[0].extra["hint"], json!("x"));
        assert_eq!(body.to_value(), raw);
        assert_eq!(serde_json::to_value(&body).unwrap(), raw);
    }

    #[test]
    fn test_success_envelope_round_trips_exactly() {
        let raw = json!({ "id": "x", "data": null });
        let body = SubmissionBody::from_value(raw.clone());
        assert!(body.as_success().is_some());
        assert_eq!(body.to_value(), raw);
        assert_eq!(serde_json::to_value(&body).unwrap(), raw);
    }

    #[test]
    fn test_error_without_message_gains_none() {
        let raw = json!({ "errors": [{ "code": "EMPTY" }] });
        let body = SubmissionBody::from_value(raw.clone());
        assert_eq!(body.as_errors().unwrap().errors[0].message, "");
        assert_eq!(body.into_value(), raw);
    }

    #[test]
    fn test_client_side_error_envelope() {
        let body = SubmissionBody::error(FormError::form(ErrorCode::StripeScaError, "declined"));
        assert_eq!(
            body.to_value(),
            json!({ "errors": [{ "code": "STRIPE_SCA_ERROR", "message": "declined" }] })
        );
        assert_eq!(
            body.as_errors().unwrap().errors[0].code,
            Some(ErrorCode::StripeScaError)
        );
    }

    #[test]
    fn test_deserialize_classifies() {
        let body: SubmissionBody = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert!(body.as_success().is_some());
    }

    #[test]
    fn test_with_field_does_not_touch_original() {
        let original = SubmissionData::from_json(json!({ "email": "a@b.c" })).unwrap();
        let copy = original.with_field("paymentMethod", "pm_1");

        match (&original, &copy) {
            (SubmissionData::Json(orig), SubmissionData::Json(new)) => {
                assert!(!orig.contains_key("paymentMethod"));
                assert_eq!(new["paymentMethod"], json!("pm_1"));
                assert_eq!(new["email"], json!("a@b.c"));
            }
            _ => panic!("expected json data"),
        }
    }

    #[test]
    fn test_with_fields_on_multipart() {
        let original: SubmissionData = FormFields::new()
            .text("email", "a@b.c")
            .file("upload", "a.txt", Some("text/plain"), b"hi".to_vec())
            .into();
        let copy = original.with_fields([("paymentIntent", "pi_1"), ("resubmitKey", "abc")]);

        let SubmissionData::Multipart(form) = copy else {
            panic!("expected multipart data");
        };
        assert_eq!(form.len(), 4);
        assert_eq!(form.get("resubmitKey"), Some("abc"));
        assert_eq!(form.get("upload"), None);

        let SubmissionData::Multipart(orig) = original else {
            unreachable!()
        };
        assert_eq!(orig.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(matches!(
            SubmissionData::from_json(json!([1])),
            Err(ClientError::InvalidData(_))
        ));
    }
}
