use std::collections::HashSet;

use sark_domain::{ResourceServer, Sensitivity, ServerStatus};
use uuid::Uuid;

/// AND-combined search predicates over the registry, per §4.11.
#[derive(Debug, Clone, Default)]
pub struct ServerQuery {
    pub status: Vec<ServerStatus>,
    pub sensitivity: HashSet<Sensitivity>,
    pub team: Option<String>,
    pub owner_principal_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub match_all_tags: bool,
    pub text: Option<String>,
}

impl ServerQuery {
    pub fn matches(&self, server: &ResourceServer) -> bool {
        if !self.status.is_empty() && !self.status.contains(&server.status) {
            return false;
        }
        if !self.sensitivity.is_empty() && !self.sensitivity.contains(&server.sensitivity) {
            return false;
        }
        if let Some(team) = &self.team {
            if !server.team_tags.iter().any(|t| t == team) {
                return false;
            }
        }
        if let Some(owner) = self.owner_principal_id {
            if server.owner_principal_id != owner {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let has = |tag: &String| server.tags.iter().any(|t| t == tag);
            let tags_ok = if self.match_all_tags {
                self.tags.iter().all(has)
            } else {
                self.tags.iter().any(has)
            };
            if !tags_ok {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let name_hit = server.name.to_lowercase().contains(&needle);
            let description_hit = server.description.to_lowercase().contains(&needle);
            if !name_hit && !description_hit {
                return false;
            }
        }
        true
    }
}
