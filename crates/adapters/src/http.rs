//! OpenAPI/Swagger discovery and invocation, grounded on
//! `original_source/src/sark/adapters/http/discovery.py`'s `OpenAPIDiscovery`
//! (walked here as `serde_json::Value` instead of typed OpenAPI structs, the
//! way the teacher's own MCP layer stays untyped over heterogeneous wire
//! documents).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sark_domain::entities::Sensitivity;
use sark_domain::TransportKind;
use serde_json::{json, Value};

use crate::adapter::{check_payload_size, with_deadline, Adapter};
use crate::types::{AdapterError, DiscoveredCapability, DiscoveredResource, Invocation, InvocationResult};

const COMMON_SPEC_PATHS: &[&str] = &[
    "/openapi.json",
    "/swagger.json",
    "/api-docs",
    "/v1/api-docs",
    "/v2/api-docs",
    "/v3/api-docs",
    "/docs/openapi.json",
    "/docs/swagger.json",
];

const HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

pub struct HttpAdapter {
    client: reqwest::Client,
    default_deadline: Duration,
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            default_deadline: Duration::from_secs(30),
        }
    }

    async fn fetch_spec(&self, base_url: &str, spec_url: Option<&str>) -> Result<Value, AdapterError> {
        if let Some(url) = spec_url {
            if let Some(spec) = self.try_fetch(url).await {
                return Ok(spec);
            }
        }
        let base = base_url.trim_end_matches('/');
        for path in COMMON_SPEC_PATHS {
            let url = format!("{base}{path}");
            if let Some(spec) = self.try_fetch(&url).await {
                return Ok(spec);
            }
        }
        Err(AdapterError::Discovery(format!(
            "no OpenAPI/Swagger spec found under {base_url}"
        )))
    }

    async fn try_fetch(&self, url: &str) -> Option<Value> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let spec: Value = response.json().await.ok()?;
        if spec.get("openapi").is_some() || spec.get("swagger").is_some() {
            Some(spec)
        } else {
            None
        }
    }

    fn resolve_ref<'a>(&self, ref_path: &str, spec: &'a Value) -> Option<&'a Value> {
        let path = ref_path.strip_prefix("#/")?;
        let mut current = spec;
        for part in path.split('/') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn resolve<'a>(&self, value: &'a Value, spec: &'a Value) -> &'a Value {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.resolve_ref(reference, spec).unwrap_or(value),
            None => value,
        }
    }

    fn build_input_schema(&self, operation: &Value, path_params: &[Value], spec: &Value) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        let mut all_params: Vec<Value> = path_params.to_vec();
        if let Some(op_params) = operation.get("parameters").and_then(Value::as_array) {
            all_params.extend(op_params.iter().cloned());
        }

        for param in &all_params {
            let param = self.resolve(param, spec);
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };
            let location = param.get("in").and_then(Value::as_str).unwrap_or("query");
            let key = if location == "path" {
                name.to_string()
            } else {
                format!("{location}_{name}")
            };
            let schema = param.get("schema").cloned().unwrap_or_else(|| {
                json!({ "type": param.get("type").and_then(Value::as_str).unwrap_or("string") })
            });
            properties.insert(key.clone(), schema);
            if param.get("required").and_then(Value::as_bool).unwrap_or(false) {
                required.push(Value::String(key));
            }
        }

        if let Some(request_body) = operation.get("requestBody") {
            let request_body = self.resolve(request_body, spec);
            if let Some(body_schema) = request_body
                .get("content")
                .and_then(|c| c.get("application/json"))
                .and_then(|c| c.get("schema"))
            {
                let body_schema = self.resolve(body_schema, spec);
                properties.insert("body".to_string(), body_schema.clone());
                if request_body.get("required").and_then(Value::as_bool).unwrap_or(false) {
                    required.push(Value::String("body".to_string()));
                }
            }
        }

        json!({ "type": "object", "properties": Value::Object(properties), "required": required })
    }

    fn sensitivity_for(&self, method: &str, path: &str, operation: &Value) -> Sensitivity {
        let has_security = operation.get("security").is_some()
            || operation.get("deprecated").and_then(Value::as_bool).unwrap_or(false);
        let mutating = matches!(method, "post" | "put" | "patch" | "delete");

        if mutating {
            return if has_security { Sensitivity::High } else { Sensitivity::Medium };
        }

        const SENSITIVE_KEYWORDS: &[&str] = &["admin", "password", "secret", "token", "key", "credential"];
        let path_lower = path.to_lowercase();
        if SENSITIVE_KEYWORDS.iter().any(|kw| path_lower.contains(kw)) {
            return Sensitivity::High;
        }
        if has_security {
            Sensitivity::Medium
        } else {
            Sensitivity::Low
        }
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn protocol_name(&self) -> &str {
        "http"
    }

    fn protocol_version(&self) -> &str {
        "openapi-3.x/swagger-2.0"
    }

    async fn discover_resources(&self, config: &Value) -> Result<Vec<DiscoveredResource>, AdapterError> {
        let base_url = config
            .get("base_url")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::Discovery("config missing base_url".into()))?;
        let spec_url = config.get("spec_url").and_then(Value::as_str);

        let spec = self.fetch_spec(base_url, spec_url).await?;
        let info = spec.get("info").cloned().unwrap_or(Value::Null);
        let name = info
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("unknown api")
            .to_string();
        let description = info
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(vec![DiscoveredResource {
            name,
            endpoint: base_url.to_string(),
            transport: TransportKind::Http,
            description,
            metadata: spec,
        }])
    }

    async fn get_capabilities(&self, resource: &DiscoveredResource) -> Result<Vec<DiscoveredCapability>, AdapterError> {
        let spec = &resource.metadata;
        let paths = spec.get("paths").and_then(Value::as_object).ok_or_else(|| {
            AdapterError::Discovery(format!("spec for {} has no paths object", resource.name))
        })?;

        let mut capabilities = Vec::new();
        for (path, path_item) in paths {
            let path_params: Vec<Value> = path_item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for method in HTTP_METHODS {
                let Some(operation) = path_item.get(*method) else {
                    continue;
                };
                let operation_id = operation
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{method}_{}", path.replace('/', "_")));

                let description = operation
                    .get("description")
                    .or_else(|| operation.get("summary"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                let input_schema = self.build_input_schema(operation, &path_params, spec);
                let sensitivity_hint = self.sensitivity_for(method, path, operation);

                capabilities.push(DiscoveredCapability {
                    name: operation_id,
                    description,
                    input_schema,
                    sensitivity_hint,
                    metadata: json!({ "http_method": method.to_uppercase(), "http_path": path }),
                });
            }
        }
        Ok(capabilities)
    }

    fn validate_request(&self, invocation: &Invocation) -> Result<(), AdapterError> {
        check_payload_size(&invocation.arguments)
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, AdapterError> {
        self.validate_request(invocation)?;
        let started = Instant::now();
        let method = invocation
            .arguments
            .get("_http_method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_string();
        let path = invocation
            .arguments
            .get("_http_path")
            .and_then(Value::as_str)
            .unwrap_or("/")
            .to_string();
        let body = invocation.arguments.get("body").cloned();

        let url = format!("{}{}", invocation.resource.endpoint.trim_end_matches('/'), path);
        let client = self.client.clone();

        let call = async move {
            let mut request = client
                .request(method.parse().unwrap_or(reqwest::Method::GET), &url)
                .header("X-SARK-Request-ID", invocation.request_id.to_string());
            if let Some(body) = body {
                request = request.json(&body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| AdapterError::Invocation(e.to_string()))?;
            let status = response.status();
            let payload: Value = response.json().await.unwrap_or(Value::Null);
            if status.is_success() {
                Ok(payload)
            } else {
                Err(AdapterError::Invocation(format!("http status {status}")))
            }
        };

        match with_deadline(invocation.deadline, call).await {
            Ok(payload) => Ok(InvocationResult::ok(payload, started.elapsed().as_millis() as u64)),
            Err(err) => Ok(InvocationResult::failed(err.to_string(), started.elapsed().as_millis() as u64)),
        }
    }

    async fn health_check(&self, resource: &DiscoveredResource) -> bool {
        self.client
            .get(&resource.endpoint)
            .send()
            .await
            .map(|r| r.status().is_success() || r.status().as_u16() == 404)
            .unwrap_or(false)
    }
}
