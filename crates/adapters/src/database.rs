//! Database adapter, grounded on
//! `other_examples/.../custom-adapter-example/database_adapter.py`'s
//! `DatabaseAdapter`: a statically-configured table catalog synthesizes
//! four CRUD capabilities per table, and raw queries are checked against a
//! blacklist of destructive constructs before they reach the wire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::RegexSet;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::{Arguments, Column, Row};

use sark_domain::entities::Sensitivity;
use sark_domain::TransportKind;

use crate::adapter::{check_payload_size, with_deadline, Adapter};
use crate::types::{AdapterError, DiscoveredCapability, DiscoveredResource, Invocation, InvocationResult};

const SENSITIVE_TABLES: &[&str] = &["users", "payments", "credentials", "secrets"];

/// SQL fragments that should never reach a downstream database regardless
/// of which capability invoked them.
const DANGEROUS_PATTERNS: &[&str] = &[
    r"(?i);\s*drop\b",
    r"(?i);\s*truncate\b",
    r"(?i);\s*alter\b",
    r"--",
    r"/\*",
    r"(?i)xp_cmdshell",
    r"(?i)sp_executesql",
    r"(?i)exec\s*\(",
];

#[derive(Debug, Clone, Deserialize)]
pub struct TableColumn {
    pub name: String,
    #[serde(default = "default_column_type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

fn default_column_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<TableColumn>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseConfig {
    connection_string: String,
    tables: Vec<TableSchema>,
}

pub struct DatabaseAdapter {
    dangerous: RegexSet,
    default_deadline: Duration,
}

impl Default for DatabaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseAdapter {
    pub fn new() -> Self {
        sqlx::any::install_default_drivers();
        Self {
            dangerous: RegexSet::new(DANGEROUS_PATTERNS).expect("static patterns always compile"),
            default_deadline: Duration::from_secs(30),
        }
    }

    fn sensitivity_for(table: &str) -> Sensitivity {
        if SENSITIVE_TABLES.contains(&table.to_ascii_lowercase().as_str()) {
            Sensitivity::High
        } else if table.to_ascii_lowercase().ends_with("_audit") {
            Sensitivity::Medium
        } else {
            Sensitivity::Low
        }
    }

    fn schema_for(columns: &[TableColumn]) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "parameters": { "type": "array" },
            },
            "required": ["query"],
            "columns": columns.iter().map(|c| json!({
                "name": c.name,
                "data_type": c.data_type,
                "nullable": c.nullable,
            })).collect::<Vec<_>>(),
        })
    }

    fn expected_keyword(capability_name: &str) -> Option<&'static str> {
        let operation = capability_name.rsplit('-').next()?;
        match operation {
            "select" => Some("SELECT"),
            "insert" => Some("INSERT"),
            "update" => Some("UPDATE"),
            "delete" => Some("DELETE"),
            _ => None,
        }
    }

    fn bind_parameters<'q>(mut args: AnyArguments<'q>, parameters: &'q [Value]) -> Result<AnyArguments<'q>, AdapterError> {
        for parameter in parameters {
            match parameter {
                Value::Null => args.add(None::<String>).map_err(|e| AdapterError::Invocation(e.to_string()))?,
                Value::Bool(b) => args.add(*b).map_err(|e| AdapterError::Invocation(e.to_string()))?,
                Value::Number(n) if n.is_i64() || n.is_u64() => {
                    args.add(n.as_i64().unwrap_or_default()).map_err(|e| AdapterError::Invocation(e.to_string()))?
                }
                Value::Number(n) => args.add(n.as_f64().unwrap_or_default()).map_err(|e| AdapterError::Invocation(e.to_string()))?,
                Value::String(s) => args.add(s.clone()).map_err(|e| AdapterError::Invocation(e.to_string()))?,
                other => {
                    return Err(AdapterError::ValidationFailed(format!(
                        "unsupported parameter type for bind: {other}"
                    )))
                }
            }
        }
        Ok(args)
    }

    fn row_to_json(row: &AnyRow) -> Value {
        let mut object = serde_json::Map::new();
        for column in row.columns() {
            let name = column.name().to_string();
            let value = row
                .try_get::<i64, _>(name.as_str())
                .map(Value::from)
                .or_else(|_| row.try_get::<f64, _>(name.as_str()).map(Value::from))
                .or_else(|_| row.try_get::<bool, _>(name.as_str()).map(Value::from))
                .or_else(|_| row.try_get::<String, _>(name.as_str()).map(Value::from))
                .unwrap_or(Value::Null);
            object.insert(name, value);
        }
        Value::Object(object)
    }
}

#[async_trait]
impl Adapter for DatabaseAdapter {
    fn protocol_name(&self) -> &str {
        "database"
    }

    fn protocol_version(&self) -> &str {
        "catalog-1.0"
    }

    async fn discover_resources(&self, config: &Value) -> Result<Vec<DiscoveredResource>, AdapterError> {
        let config: DatabaseConfig =
            serde_json::from_value(config.clone()).map_err(|e| AdapterError::Discovery(format!("invalid database config: {e}")))?;

        Ok(config
            .tables
            .into_iter()
            .map(|table| DiscoveredResource {
                name: table.name.clone(),
                endpoint: config.connection_string.clone(),
                transport: TransportKind::Database,
                description: format!("table {}", table.name),
                metadata: json!({
                    "table": table.name,
                    "columns": table.columns.iter().map(|c| json!({
                        "name": c.name,
                        "data_type": c.data_type,
                        "nullable": c.nullable,
                    })).collect::<Vec<_>>(),
                }),
            })
            .collect())
    }

    async fn get_capabilities(&self, resource: &DiscoveredResource) -> Result<Vec<DiscoveredCapability>, AdapterError> {
        let columns: Vec<TableColumn> = resource
            .metadata
            .get("columns")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AdapterError::Discovery(format!("malformed column catalog: {e}")))?
            .unwrap_or_default();
        let sensitivity_hint = Self::sensitivity_for(&resource.name);

        Ok(["select", "insert", "update", "delete"]
            .into_iter()
            .map(|operation| DiscoveredCapability {
                name: format!("{}-{operation}", resource.name),
                description: format!("{} records in {}", operation, resource.name),
                input_schema: Self::schema_for(&columns),
                sensitivity_hint,
                metadata: json!({ "table": resource.name, "operation": operation }),
            })
            .collect())
    }

    fn validate_request(&self, invocation: &Invocation) -> Result<(), AdapterError> {
        check_payload_size(&invocation.arguments)?;

        let query = invocation
            .arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::ValidationFailed("missing required argument: query".into()))?;

        if self.dangerous.is_match(query) {
            return Err(AdapterError::ValidationFailed(
                "query contains a disallowed destructive construct".into(),
            ));
        }

        if let Some(expected) = Self::expected_keyword(&invocation.capability_name) {
            if !query.trim_start().to_ascii_uppercase().starts_with(expected) {
                return Err(AdapterError::ValidationFailed(format!(
                    "query must start with {expected} for this capability"
                )));
            }
        }

        Ok(())
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, AdapterError> {
        self.validate_request(invocation)?;
        let started = Instant::now();
        let connection_string = invocation.resource.endpoint.clone();
        let query = invocation.arguments["query"].as_str().unwrap_or_default().to_string();
        let parameters: Vec<Value> = invocation
            .arguments
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let is_select = query.trim_start().to_ascii_uppercase().starts_with("SELECT");

        let call = async {
            let pool = AnyPoolOptions::new()
                .max_connections(1)
                .connect(&connection_string)
                .await
                .map_err(|e| AdapterError::Invocation(format!("connect failed: {e}")))?;

            let args = Self::bind_parameters(AnyArguments::default(), &parameters)?;
            let built = sqlx::query_with(&query, args);

            if is_select {
                let rows = built
                    .fetch_all(&pool)
                    .await
                    .map_err(|e| AdapterError::Invocation(format!("query failed: {e}")))?;
                let rows: Vec<Value> = rows.iter().map(Self::row_to_json).collect();
                Ok(json!({ "rows": rows, "row_count": rows.len() }))
            } else {
                let result = built
                    .execute(&pool)
                    .await
                    .map_err(|e| AdapterError::Invocation(format!("query failed: {e}")))?;
                Ok(json!({ "rows_affected": result.rows_affected() }))
            }
        };

        match with_deadline(invocation.deadline.min(self.default_deadline), call).await {
            Ok(payload) => Ok(InvocationResult::ok(payload, started.elapsed().as_millis() as u64)),
            Err(err) => Ok(InvocationResult::failed(err.to_string(), started.elapsed().as_millis() as u64)),
        }
    }

    async fn health_check(&self, resource: &DiscoveredResource) -> bool {
        match AnyPoolOptions::new().max_connections(1).connect(&resource.endpoint).await {
            Ok(pool) => sqlx::query("SELECT 1").execute(&pool).await.is_ok(),
            Err(_) => false,
        }
    }
}
