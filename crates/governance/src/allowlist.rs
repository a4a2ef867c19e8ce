use parking_lot::RwLock;

use sark_domain::entities::AllowlistEntry;

/// Identifiers (principal ids or IP/CIDR literals) that bypass the
/// enforcement pipeline with a direct allow.
pub struct AllowlistStore(RwLock<Vec<AllowlistEntry>>);

impl AllowlistStore {
    pub fn new() -> Self {
        Self(RwLock::new(Vec::new()))
    }

    pub fn add(&self, entry: AllowlistEntry) {
        let mut guard = self.0.write();
        if !guard.iter().any(|e| e.identifier == entry.identifier) {
            guard.push(entry);
        }
    }

    pub fn remove(&self, identifier: &str) -> bool {
        let mut guard = self.0.write();
        let before = guard.len();
        guard.retain(|e| e.identifier != identifier);
        guard.len() != before
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.0.read().iter().any(|e| e.identifier == identifier)
    }

    pub fn list(&self) -> Vec<AllowlistEntry> {
        self.0.read().clone()
    }
}

impl Default for AllowlistStore {
    fn default() -> Self {
        Self::new()
    }
}
