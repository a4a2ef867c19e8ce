use std::collections::HashMap;

use parking_lot::RwLock;
use sark_domain::error::SarkError;
use sark_domain::{Capability, Sensitivity};
use uuid::Uuid;

/// Every declared `Capability` (tool) across every registered server, keyed
/// by id. Same shape as [`crate::ServerRegistry`] — one `RwLock`-guarded
/// map, whole-entry replace — since capabilities are registered in bulk at
/// discovery time and read far more than they're written.
#[derive(Default)]
pub struct CapabilityStore {
    capabilities: RwLock<HashMap<Uuid, Capability>>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self {
            capabilities: RwLock::new(HashMap::new()),
        }
    }

    /// Replace every capability belonging to `server_id` with `discovered`.
    /// Called after a discovery run (§4.8); existing `override_history` for
    /// a capability that survives under the same id is preserved, since a
    /// human's sensitivity override shouldn't be wiped by re-discovery.
    pub fn replace_for_server(&self, server_id: Uuid, discovered: Vec<Capability>) {
        let mut capabilities = self.capabilities.write();
        capabilities.retain(|_, c| c.server_id != server_id);
        for cap in discovered {
            capabilities.insert(cap.id, cap);
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Capability, SarkError> {
        self.capabilities
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| SarkError::NotFound(format!("capability {id} not found")))
    }

    pub fn list(&self, server_id: Option<Uuid>) -> Vec<Capability> {
        self.capabilities
            .read()
            .values()
            .filter(|c| server_id.map(|sid| c.server_id == sid).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Manual sensitivity override (`PATCH /tools/{id}/sensitivity`).
    pub fn set_sensitivity(
        &self,
        id: Uuid,
        level: Sensitivity,
        reviewer_principal_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<Capability, SarkError> {
        let mut capabilities = self.capabilities.write();
        let cap = capabilities
            .get_mut(&id)
            .ok_or_else(|| SarkError::NotFound(format!("capability {id} not found")))?;
        cap.set_sensitivity(level, reviewer_principal_id, reason);
        Ok(cap.clone())
    }

    pub fn remove_for_server(&self, server_id: Uuid) {
        self.capabilities.write().retain(|_, c| c.server_id != server_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(server_id: Uuid) -> Capability {
        Capability {
            id: Uuid::new_v4(),
            server_id,
            name: "list_files".into(),
            description: "list files".into(),
            input_schema: serde_json::json!({}),
            sensitivity: Sensitivity::Low,
            override_history: vec![],
            requires_approval: false,
        }
    }

    #[test]
    fn replace_for_server_drops_stale_entries() {
        let store = CapabilityStore::new();
        let server_id = Uuid::new_v4();
        let cap_a = capability(server_id);
        store.replace_for_server(server_id, vec![cap_a.clone()]);
        assert_eq!(store.list(Some(server_id)).len(), 1);

        let cap_b = capability(server_id);
        store.replace_for_server(server_id, vec![cap_b.clone()]);
        let listed = store.list(Some(server_id));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, cap_b.id);
        assert!(store.get(cap_a.id).is_err());
    }

    #[test]
    fn set_sensitivity_records_override() {
        let store = CapabilityStore::new();
        let server_id = Uuid::new_v4();
        let cap = capability(server_id);
        let id = cap.id;
        store.replace_for_server(server_id, vec![cap]);

        let reviewer = Uuid::new_v4();
        let updated = store
            .set_sensitivity(id, Sensitivity::Critical, reviewer, "handles prod secrets")
            .unwrap();
        assert_eq!(updated.sensitivity, Sensitivity::Critical);
        assert_eq!(updated.override_history.len(), 1);
    }

    #[test]
    fn set_sensitivity_on_unknown_capability_is_not_found() {
        let store = CapabilityStore::new();
        assert!(matches!(
            store.set_sensitivity(Uuid::new_v4(), Sensitivity::High, Uuid::new_v4(), "x"),
            Err(SarkError::NotFound(_))
        ));
    }
}
