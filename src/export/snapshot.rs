//! Recorded-response API client
//!
//! A snapshot file records, per `Service.Method`, the request fields the
//! method takes and the responses returned for specific parameter sets:
//!
//! ```yaml
//! methods:
//!   Inputs.ListInput:
//!     request: [{ name: group_id }]
//!     calls:
//!       - params: { group_id: default }
//!         body: { count: 1, items: [{ id: in_syslog, type: syslog }] }
//!       - params: { group_id: edge }
//!         error: "status 500"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::client::{ApiClient, ApiError, ParamMap, Request, RequestField, RequestShape};
use super::error::{ExportError, ExportResult};
use crate::traits::FileSystem;

/// One recorded call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedCall {
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Recorded method: its request shape and calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedMethod {
    #[serde(default)]
    pub request: Vec<RequestField>,
    #[serde(default)]
    pub calls: Vec<RecordedCall>,
}

/// API client that answers from recorded responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotClient {
    #[serde(default)]
    methods: BTreeMap<String, RecordedMethod>,
}

impl SnapshotClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a YAML or JSON file
    pub fn load(fs: &dyn FileSystem, path: &Path) -> ExportResult<Self> {
        let content = fs
            .read_to_string(path)
            .map_err(|e| ExportError::FileSystem(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse snapshot content (YAML is a superset of JSON)
    pub fn parse(content: &str) -> ExportResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Declare a method and its required request fields
    pub fn method(mut self, service: &str, method: &str, fields: &[&str]) -> Self {
        self.methods
            .entry(method_key(service, method))
            .or_default()
            .request = fields.iter().map(|f| RequestField::required(f)).collect();
        self
    }

    /// Record a successful response for a parameter set
    pub fn respond(
        mut self,
        service: &str,
        method: &str,
        params: &[(&str, &str)],
        body: serde_json::Value,
    ) -> Self {
        self.record(
            service,
            method,
            RecordedCall {
                params: to_params(params),
                body: Some(body),
                error: None,
            },
        );
        self
    }

    /// Record a failing response for a parameter set
    pub fn fail(
        mut self,
        service: &str,
        method: &str,
        params: &[(&str, &str)],
        error: &str,
    ) -> Self {
        self.record(
            service,
            method,
            RecordedCall {
                params: to_params(params),
                body: None,
                error: Some(error.to_string()),
            },
        );
        self
    }

    fn record(&mut self, service: &str, method: &str, call: RecordedCall) {
        self.methods
            .entry(method_key(service, method))
            .or_default()
            .calls
            .push(call);
    }
}

fn method_key(service: &str, method: &str) -> String {
    format!("{}.{}", service, method)
}

fn to_params(params: &[(&str, &str)]) -> ParamMap {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl ApiClient for SnapshotClient {
    fn request_shape(&self, service: &str, method: &str) -> Option<RequestShape> {
        self.methods
            .get(&method_key(service, method))
            .map(|m| RequestShape::new(m.request.clone()))
    }

    fn invoke(
        &self,
        service: &str,
        method: &str,
        request: &Request,
    ) -> Result<serde_json::Value, ApiError> {
        let recorded = self
            .methods
            .get(&method_key(service, method))
            .ok_or_else(|| ApiError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })?;

        let call = recorded
            .calls
            .iter()
            .find(|c| c.params == request.fields)
            .ok_or_else(|| {
                ApiError::NotRecorded(format!(
                    "{} with {:?}",
                    method_key(service, method),
                    request.fields
                ))
            })?;

        if let Some(error) = &call.error {
            return Err(ApiError::Status {
                code: 500,
                message: error.clone(),
            });
        }

        Ok(call.body.clone().unwrap_or(serde_json::Value::Null))
    }
}
