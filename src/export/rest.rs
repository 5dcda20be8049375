//! HTTP API client
//!
//! Routes `Service.Method` names to REST paths under `{base_url}/api/v1`.
//! A method's request fields are the placeholders of its path template, so
//! request-shape introspection and path building share one source.

use std::collections::BTreeMap;

use url::Url;

use super::catalog;
use super::client::{ApiClient, ApiError, Request, RequestField, RequestShape};
use super::error::{ExportError, ExportResult};
use super::registry::{Registry, RegistryEntry, ScopeKind};

const API_PREFIX: &[&str] = &["api", "v1"];

/// Path prefix a type's routes live under
fn scope_prefix(scope: ScopeKind) -> &'static str {
    match scope {
        ScopeKind::Group => "/m/{group_id}",
        ScopeKind::Pack => "/m/{group_id}/p/{pack}",
        ScopeKind::Lake => "/products/lake/lakes/{lake_id}",
        ScopeKind::Global | ScopeKind::Scope => "",
    }
}

pub struct RestClient {
    http: reqwest::blocking::Client,
    base_url: Url,
    token: Option<String>,
    routes: BTreeMap<String, String>,
}

impl RestClient {
    pub fn new(base_url: &str, token: Option<String>) -> ExportResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ExportError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            http: reqwest::blocking::Client::new(),
            base_url,
            token,
            routes: BTreeMap::new(),
        })
    }

    /// Client with routes for every registry entry plus the scope listing
    pub fn for_registry(
        base_url: &str,
        token: Option<String>,
        registry: &Registry,
    ) -> ExportResult<Self> {
        let (conf_service, conf_method, conf_route) = catalog::PACK_PIPELINE_CONF_METHOD;
        let mut client = Self::new(base_url, token)?
            .route(
                catalog::SCOPE_SERVICE,
                catalog::SCOPE_LIST_METHOD,
                catalog::SCOPE_LIST_ROUTE,
            )
            .route(conf_service, conf_method, conf_route);

        for entry in registry.all_entries() {
            client = client.entry_routes(entry);
        }
        Ok(client)
    }

    /// Register a path template for a method
    pub fn route(mut self, service: &str, method: &str, template: &str) -> Self {
        self.routes
            .insert(format!("{}.{}", service, method), template.to_string());
        self
    }

    fn entry_routes(self, entry: &RegistryEntry) -> Self {
        let route = match &entry.route {
            Some(route) => format!("{}{}", scope_prefix(entry.scope), route),
            None => return self,
        };

        let mut client = self;
        if let Some(list) = &entry.list_method {
            client = client.route(&entry.service, list, &route);
        }
        if let Some(get) = &entry.get_method {
            client = client.route(&entry.service, get, &format!("{}/{{id}}", route));
        }
        client
    }

    fn template(&self, service: &str, method: &str) -> Option<&String> {
        self.routes.get(&format!("{}.{}", service, method))
    }

    /// Absolute URL for a template filled from a request
    pub fn build_url(&self, template: &str, request: &Request) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Transport(format!("'{}' cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty().extend(API_PREFIX);

            for segment in template.split('/').filter(|s| !s.is_empty()) {
                match placeholder(segment) {
                    Some(name) => {
                        let value = request.get(name).ok_or_else(|| {
                            ApiError::Transport(format!("no value for path parameter '{}'", name))
                        })?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }
        Ok(url)
    }
}

/// Name inside a `{name}` path segment
fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

impl ApiClient for RestClient {
    fn request_shape(&self, service: &str, method: &str) -> Option<RequestShape> {
        let template = self.template(service, method)?;
        let fields = template
            .split('/')
            .filter_map(placeholder)
            .map(RequestField::required)
            .collect();
        Some(RequestShape::new(fields))
    }

    fn invoke(
        &self,
        service: &str,
        method: &str,
        request: &Request,
    ) -> Result<serde_json::Value, ApiError> {
        let template = self
            .template(service, method)
            .ok_or_else(|| ApiError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })?;
        let url = self.build_url(template, request)?;

        let mut call = self.http.get(url.clone());
        if let Some(token) = &self.token {
            call = call.bearer_auth(token);
        }

        let response = call
            .send()
            .map_err(|e| ApiError::Transport(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiError::Transport(format!("reading body of {}: {}", url, e)))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
