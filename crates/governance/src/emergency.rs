use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use sark_domain::entities::EmergencySwitch;

/// Process-wide emergency flag. When active, the enforcement pipeline
/// allows every request with `source=emergency` — absolute, not subject to
/// budget or rate-limit checks.
pub struct EmergencyStore(RwLock<EmergencySwitch>);

impl EmergencyStore {
    pub fn new() -> Self {
        Self(RwLock::new(EmergencySwitch::inactive()))
    }

    pub fn is_active(&self) -> bool {
        self.0.read().active
    }

    pub fn set(&self, active: bool, reason: String, set_by_principal_id: Uuid) {
        let mut guard = self.0.write();
        guard.active = active;
        guard.reason = reason;
        guard.set_by_principal_id = set_by_principal_id;
        guard.last_set_at = Utc::now();
    }

    pub fn snapshot(&self) -> EmergencySwitch {
        self.0.read().clone()
    }
}

impl Default for EmergencyStore {
    fn default() -> Self {
        Self::new()
    }
}
