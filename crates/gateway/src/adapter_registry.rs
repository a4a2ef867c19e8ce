//! Transport-keyed adapter lookup for `/api/v1/tools/invoke`.
//!
//! One `Arc<dyn Adapter>` per `TransportKind`. `McpAdapter` is the only
//! adapter that reports `TransportKind::Stdio` from discovery, so the key
//! space never collides. `TransportKind` isn't `Hash` (it's a wire-facing
//! enum in `sark-domain`, kept minimal), so this is a 4-arm match rather
//! than a `HashMap`.

use std::sync::Arc;

use sark_adapters::{Adapter, DatabaseAdapter, GrpcAdapter, HttpAdapter, McpAdapter};
use sark_domain::entities::TransportKind;
use sark_mcp::McpManager;

pub struct AdapterRegistry {
    http: Arc<dyn Adapter>,
    grpc: Arc<dyn Adapter>,
    database: Arc<dyn Adapter>,
    mcp: Arc<dyn Adapter>,
}

impl AdapterRegistry {
    pub fn new(mcp_manager: Arc<McpManager>) -> Self {
        Self {
            http: Arc::new(HttpAdapter::new()),
            grpc: Arc::new(GrpcAdapter::new()),
            database: Arc::new(DatabaseAdapter::new()),
            mcp: Arc::new(McpAdapter::new(mcp_manager)),
        }
    }

    pub fn get(&self, transport: TransportKind) -> Arc<dyn Adapter> {
        match transport {
            TransportKind::Http => self.http.clone(),
            TransportKind::Grpc => self.grpc.clone(),
            TransportKind::Database => self.database.clone(),
            TransportKind::Stdio => self.mcp.clone(),
        }
    }
}
