use std::collections::HashMap;
use std::cmp::Ordering as CmpOrdering;

use parking_lot::RwLock;
use sark_domain::error::SarkError;
use sark_domain::{ResourceServer, ServerStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::pagination::{clamp_page_size, Cursor, SortOrder};
use crate::query::ServerQuery;

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub query: ServerQuery,
    pub page_size: Option<usize>,
    pub cursor: Option<String>,
    pub order: SortOrder,
    pub with_total: bool,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            query: ServerQuery::default(),
            page_size: None,
            cursor: None,
            order: SortOrder::default(),
            with_total: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub items: Vec<ResourceServer>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub total: Option<usize>,
}

/// In-memory capability registry: every known downstream server keyed by id.
///
/// A single `RwLock<HashMap<..>>` is enough here — the registry is read-heavy
/// and small (hundreds to low thousands of servers), and every mutation is a
/// whole-entry replace rather than a field-level update.
pub struct ServerRegistry {
    servers: RwLock<HashMap<Uuid, ResourceServer>>,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_server(&self, server: ResourceServer) -> Result<(), SarkError> {
        let mut servers = self.servers.write();
        if servers.contains_key(&server.id) {
            return Err(SarkError::Conflict(format!(
                "server {} is already registered",
                server.id
            )));
        }
        servers.insert(server.id, server);
        Ok(())
    }

    pub fn get_server(&self, id: Uuid) -> Result<ResourceServer, SarkError> {
        self.servers
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| SarkError::NotFound(format!("server {id} not found")))
    }

    pub fn update_server_status(&self, id: Uuid, to: ServerStatus) -> Result<ResourceServer, SarkError> {
        let mut servers = self.servers.write();
        let server = servers
            .get_mut(&id)
            .ok_or_else(|| SarkError::NotFound(format!("server {id} not found")))?;
        server.apply_status(to)?;
        Ok(server.clone())
    }

    pub fn remove_server(&self, id: Uuid) -> Result<(), SarkError> {
        self.servers
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SarkError::NotFound(format!("server {id} not found")))
    }

    pub fn list_servers(&self, request: ListRequest) -> Result<ListResult, SarkError> {
        let page_size = clamp_page_size(request.page_size);
        let cursor = request.cursor.as_deref().map(Cursor::decode).flatten_cursor()?;

        let servers = self.servers.read();
        let mut matched: Vec<ResourceServer> = servers
            .values()
            .filter(|s| request.query.matches(s))
            .cloned()
            .collect();
        drop(servers);

        let total = request.with_total.then(|| matched.len());

        matched.sort_by(|a, b| compare(a, b, request.order));

        let start = match cursor {
            Some(c) => matched
                .iter()
                .position(|s| past_cursor(s, &c, request.order))
                .unwrap_or(matched.len()),
            None => 0,
        };

        let remaining = &matched[start.min(matched.len())..];
        let has_more = remaining.len() > page_size;
        let page: Vec<ResourceServer> = remaining.iter().take(page_size).cloned().collect();

        let next_cursor = if has_more {
            page.last().map(|s| {
                Cursor {
                    created_at: s.created_at,
                    last_id: s.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(ListResult {
            items: page,
            next_cursor,
            has_more,
            total,
        })
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }
}

fn compare(a: &ResourceServer, b: &ResourceServer, order: SortOrder) -> CmpOrdering {
    let primary = a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id));
    match order {
        SortOrder::Ascending => primary,
        SortOrder::Descending => primary.reverse(),
    }
}

fn past_cursor(server: &ResourceServer, cursor: &Cursor, order: SortOrder) -> bool {
    let server_key = (server.created_at, server.id);
    let cursor_key = (cursor.created_at, cursor.last_id);
    match order {
        SortOrder::Ascending => server_key > cursor_key,
        SortOrder::Descending => server_key < cursor_key,
    }
}

trait FlattenCursor {
    fn flatten_cursor(self) -> Result<Option<Cursor>, SarkError>;
}

impl FlattenCursor for Option<Option<Cursor>> {
    fn flatten_cursor(self) -> Result<Option<Cursor>, SarkError> {
        match self {
            None => Ok(None),
            Some(None) => Err(SarkError::Validation("malformed pagination cursor".into())),
            Some(Some(c)) => Ok(Some(c)),
        }
    }
}
