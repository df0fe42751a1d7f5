use field_engine::{ContinuationToken, ScriptHost};
use serde::Serialize;
use tracing::info;

/// One script-layer call, stamped with the tick it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub(crate) enum ScriptLogEntry {
    Request {
        tick: u64,
        target: String,
        event: String,
        priority: u8,
    },
    Continue {
        tick: u64,
        token: u64,
    },
}

/// Script host for headless runs: logs and keeps every call.
#[derive(Debug, Default)]
pub(crate) struct ScriptLog {
    tick: u64,
    entries: Vec<ScriptLogEntry>,
}

impl ScriptLog {
    pub(crate) fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub(crate) fn into_entries(self) -> Vec<ScriptLogEntry> {
        self.entries
    }
}

impl ScriptHost for ScriptLog {
    fn request_script(&mut self, target: &str, event: &str, priority: u8) {
        info!(tick = self.tick, target, event, priority, "script_requested");
        self.entries.push(ScriptLogEntry::Request {
            tick: self.tick,
            target: target.to_string(),
            event: event.to_string(),
            priority,
        });
    }

    fn continue_execution(&mut self, token: ContinuationToken) {
        info!(tick = self.tick, token = token.0, "script_resumed");
        self.entries.push(ScriptLogEntry::Continue {
            tick: self.tick,
            token: token.0,
        });
    }
}
