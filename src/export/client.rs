//! Remote API client contract
//!
//! The engine never calls typed endpoints directly. It addresses methods by
//! `service` + `method` name, asks the client which request fields the method
//! takes, builds a request from a parameter map, and receives the response as
//! a JSON tree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::identifiers::{identifier_attribute, DiscoveredIdentifier};

/// Parameter name to value map used to populate requests
pub type ParamMap = BTreeMap<String, String>;

/// One field of a method's request object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestField {
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl RequestField {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
        }
    }
}

/// The introspected shape of a method's request object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestShape {
    pub fields: Vec<RequestField>,
}

impl RequestShape {
    pub fn new(fields: Vec<RequestField>) -> Self {
        Self { fields }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Why a request object could not be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    MissingField(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::MissingField(name) => {
                write!(f, "request field '{}' has no value", name)
            }
        }
    }
}

/// A populated request object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub fields: ParamMap,
}

impl Request {
    /// Populate a request by matching parameter names to request fields.
    ///
    /// Unknown parameters are ignored; a required field with no matching
    /// non-empty parameter is an error.
    pub fn build(shape: &RequestShape, params: &ParamMap) -> Result<Self, RequestError> {
        let mut fields = ParamMap::new();

        for field in &shape.fields {
            match params.get(&field.name).filter(|v| !v.is_empty()) {
                Some(value) => {
                    fields.insert(field.name.clone(), value.clone());
                }
                None if field.required => {
                    return Err(RequestError::MissingField(field.name.clone()));
                }
                None => {}
            }
        }

        Ok(Self { fields })
    }

    /// Populate a request from discovered identifiers.
    ///
    /// An identifier key matches a request field of the same name or of its
    /// attribute name (`group` matches `group_id`).
    pub fn from_identifiers(
        shape: &RequestShape,
        ids: &DiscoveredIdentifier,
    ) -> Result<Self, RequestError> {
        Self::build(shape, &identifier_params(ids))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Expand identifiers into a parameter map under both key and attribute names
pub fn identifier_params(ids: &DiscoveredIdentifier) -> ParamMap {
    let mut params = ParamMap::new();
    for (key, value) in ids.iter() {
        params.insert(key.clone(), value.clone());
        params.insert(identifier_attribute(key), value.clone());
    }
    params
}

/// Errors returned by an API client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The client has no such service/method
    MethodNotFound { service: String, method: String },
    /// The call was made but the server rejected it
    Status { code: u16, message: String },
    /// Transport-level failure
    Transport(String),
    /// Response body could not be decoded
    Decode(String),
    /// No recorded response matches the request
    NotRecorded(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MethodNotFound { service, method } => {
                write!(f, "method {}.{} not found", service, method)
            }
            ApiError::Status { code, message } => {
                write!(f, "server returned status {}: {}", code, message)
            }
            ApiError::Transport(msg) => write!(f, "transport error: {}", msg),
            ApiError::Decode(msg) => write!(f, "failed to decode response: {}", msg),
            ApiError::NotRecorded(msg) => write!(f, "no recorded response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// A remote procedure client addressed by service and method name
pub trait ApiClient: Send + Sync {
    /// Request fields a method takes, or `None` if the method does not exist
    fn request_shape(&self, service: &str, method: &str) -> Option<RequestShape>;

    /// Invoke a method with a populated request
    fn invoke(
        &self,
        service: &str,
        method: &str,
        request: &Request,
    ) -> Result<serde_json::Value, ApiError>;

    /// Look up the request shape, build the request, and invoke
    fn call(
        &self,
        service: &str,
        method: &str,
        params: &ParamMap,
    ) -> Result<serde_json::Value, CallError> {
        let shape = self
            .request_shape(service, method)
            .ok_or_else(|| {
                CallError::Api(ApiError::MethodNotFound {
                    service: service.to_string(),
                    method: method.to_string(),
                })
            })?;
        let request = Request::build(&shape, params).map_err(CallError::Request)?;
        self.invoke(service, method, &request).map_err(CallError::Api)
    }
}

/// Failure of [`ApiClient::call`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Request(RequestError),
    Api(ApiError),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Request(err) => write!(f, "{}", err),
            CallError::Api(err) => write!(f, "{}", err),
        }
    }
}

/// Items of a list response (`{"items": [...]}` or a bare array)
pub fn response_items(body: &serde_json::Value) -> Vec<serde_json::Value> {
    match body {
        serde_json::Value::Array(items) => items.clone(),
        serde_json::Value::Object(fields) => match fields.get("items") {
            Some(serde_json::Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// The single item of a get response, or the body itself
pub fn response_item(body: &serde_json::Value) -> Option<serde_json::Value> {
    match body.get("items") {
        Some(serde_json::Value::Array(items)) => items.first().cloned(),
        Some(_) => None,
        None if body.is_object() => Some(body.clone()),
        None => None,
    }
}
