//! Prefixed ID generation for stored entities.
//!
//! Format: `{entity}_{uuid_simple}` (32 hex chars, no hyphens), e.g.
//! `lic_0f3a...`. The prefix makes ids self-describing in logs and lets
//! handlers reject ids of the wrong kind before touching the database.

use uuid::Uuid;

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Product,
    License,
    CheckRecord,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Product => "prod",
            Self::License => "lic",
            Self::CheckRecord => "chk",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }

    /// Validate that `s` is an id of this entity type.
    ///
    /// This is a cheap check to reject garbage before hitting the database.
    pub fn is_valid_id(&self, s: &str) -> bool {
        let Some(hex_part) = s
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix('_'))
        else {
            return false;
        };
        hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
    }
}
