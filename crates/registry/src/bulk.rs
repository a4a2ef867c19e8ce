use sark_domain::{ResourceServer, ServerStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::store::ServerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Attempt every item independently; the response summarizes which
    /// succeeded and which failed and why.
    BestEffort,
    /// All items must succeed together, or nothing is applied.
    Transactional,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

impl BulkResult {
    fn rolled_back(ids: Vec<Uuid>, reason: &str) -> Self {
        BulkResult {
            succeeded: Vec::new(),
            failed: ids
                .into_iter()
                .map(|id| BulkFailure {
                    id,
                    reason: reason.to_string(),
                })
                .collect(),
        }
    }
}

pub fn bulk_register(registry: &ServerRegistry, specs: Vec<ResourceServer>, mode: BulkMode) -> BulkResult {
    match mode {
        BulkMode::BestEffort => {
            let mut result = BulkResult::default();
            for spec in specs {
                let id = spec.id;
                match registry.register_server(spec) {
                    Ok(()) => result.succeeded.push(id),
                    Err(err) => result.failed.push(BulkFailure {
                        id,
                        reason: err.to_string(),
                    }),
                }
            }
            result
        }
        BulkMode::Transactional => {
            let ids: Vec<Uuid> = specs.iter().map(|s| s.id).collect();
            let mut applied = Vec::with_capacity(specs.len());
            for spec in specs {
                let id = spec.id;
                match registry.register_server(spec) {
                    Ok(()) => applied.push(id),
                    Err(err) => {
                        for applied_id in applied {
                            let _ = registry.remove_server(applied_id);
                        }
                        return BulkResult::rolled_back(
                            ids,
                            &format!("batch rolled back: {id} failed with {err}"),
                        );
                    }
                }
            }
            BulkResult {
                succeeded: applied,
                failed: Vec::new(),
            }
        }
    }
}

pub fn bulk_update(
    registry: &ServerRegistry,
    updates: Vec<(Uuid, ServerStatus)>,
    mode: BulkMode,
) -> BulkResult {
    match mode {
        BulkMode::BestEffort => {
            let mut result = BulkResult::default();
            for (id, to) in updates {
                match registry.update_server_status(id, to) {
                    Ok(_) => result.succeeded.push(id),
                    Err(err) => result.failed.push(BulkFailure {
                        id,
                        reason: err.to_string(),
                    }),
                }
            }
            result
        }
        BulkMode::Transactional => {
            let ids: Vec<Uuid> = updates.iter().map(|(id, _)| *id).collect();
            let mut previous = Vec::with_capacity(updates.len());
            for (id, to) in updates {
                let before = match registry.get_server(id) {
                    Ok(server) => server.status,
                    Err(err) => {
                        rollback(registry, &previous);
                        return BulkResult::rolled_back(
                            ids,
                            &format!("batch rolled back: {id} failed with {err}"),
                        );
                    }
                };
                match registry.update_server_status(id, to) {
                    Ok(_) => previous.push((id, before)),
                    Err(err) => {
                        rollback(registry, &previous);
                        return BulkResult::rolled_back(
                            ids,
                            &format!("batch rolled back: {id} failed with {err}"),
                        );
                    }
                }
            }
            BulkResult {
                succeeded: previous.into_iter().map(|(id, _)| id).collect(),
                failed: Vec::new(),
            }
        }
    }
}

fn rollback(registry: &ServerRegistry, applied: &[(Uuid, ServerStatus)]) {
    for (id, original_status) in applied.iter().rev() {
        if let Err(err) = registry.update_server_status(*id, *original_status) {
            tracing::warn!(server_id = %id, error = %err, "failed to roll back server status during transactional bulk update");
        }
    }
}
