// ── Pending command registry ──
//
// Commands accepted by the service but not yet confirmed, keyed by the
// job id the service handed back.

use std::collections::HashMap;

/// One in-flight command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub correlation_id: String,
    pub home_id: i64,
    pub device_id: i64,
}

impl PendingCommand {
    pub fn targets(&self, home_id: i64, device_id: i64) -> bool {
        self.home_id == home_id && self.device_id == device_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingCommands {
    entries: HashMap<String, PendingCommand>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a command. Re-registering an id replaces the old entry.
    pub fn register(&mut self, correlation_id: impl Into<String>, home_id: i64, device_id: i64) {
        let correlation_id = correlation_id.into();
        self.entries.insert(
            correlation_id.clone(),
            PendingCommand {
                correlation_id,
                home_id,
                device_id,
            },
        );
    }

    /// Remove and return the entry for `correlation_id`.
    pub fn resolve(&mut self, correlation_id: &str) -> Option<PendingCommand> {
        self.entries.remove(correlation_id)
    }

    /// Look up an entry without removing it.
    pub fn peek(&self, correlation_id: &str) -> Option<&PendingCommand> {
        self.entries.get(correlation_id)
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.contains_key(correlation_id)
    }

    /// Whether any command for this unit is still unconfirmed.
    pub fn has_pending_for(&self, home_id: i64, device_id: i64) -> bool {
        self.entries
            .values()
            .any(|cmd| cmd.targets(home_id, device_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
