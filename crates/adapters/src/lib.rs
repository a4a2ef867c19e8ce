//! Protocol Adapters (C8) — one `Adapter` implementation per downstream
//! transport (HTTP, gRPC, database, MCP), sharing a common discovery /
//! capability / invocation surface so the enforcement pipeline never has
//! to know which wire protocol a tool actually speaks.

pub mod adapter;
pub mod database;
pub mod grpc;
pub mod http;
pub mod mcp;
pub mod types;

pub use adapter::{check_payload_size, with_deadline, Adapter, MAX_PAYLOAD_BYTES};
pub use database::DatabaseAdapter;
pub use grpc::GrpcAdapter;
pub use http::HttpAdapter;
pub use mcp::McpAdapter;
pub use types::{AdapterError, DiscoveredCapability, DiscoveredResource, Invocation, InvocationResult};
