use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle for a suspended script waiting on an actor action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub u64);

/// Action kinds a script can wait on. Each kind completes independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Linear,
    Jump,
    Turn,
    Offset,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Linear => "linear",
            Self::Jump => "jump",
            Self::Turn => "turn",
            Self::Offset => "offset",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the requesting script should do after issuing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Keep executing; nothing will be resumed for this request.
    Proceed,
    /// Suspend; `continue_execution(token)` is called once the action completes.
    Pending(ContinuationToken),
}

/// Script dispatcher collaborator.
pub trait ScriptHost {
    fn request_script(&mut self, target: &str, event: &str, priority: u8);

    fn continue_execution(&mut self, token: ContinuationToken);
}

/// Host that drops every call; useful for ticking without a script layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn request_script(&mut self, _target: &str, _event: &str, _priority: u8) {}

    fn continue_execution(&mut self, _token: ContinuationToken) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCall {
    Request {
        target: String,
        event: String,
        priority: u8,
    },
    Continue(ContinuationToken),
}

/// Host that records every call in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingScriptHost {
    calls: Vec<ScriptCall>,
}

impl RecordingScriptHost {
    pub fn calls(&self) -> &[ScriptCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<ScriptCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn resumed_tokens(&self) -> Vec<ContinuationToken> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ScriptCall::Continue(token) => Some(*token),
                ScriptCall::Request { .. } => None,
            })
            .collect()
    }

    pub fn requested_events(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ScriptCall::Request { target, event, .. } => Some((target.clone(), event.clone())),
                ScriptCall::Continue(_) => None,
            })
            .collect()
    }
}

impl ScriptHost for RecordingScriptHost {
    fn request_script(&mut self, target: &str, event: &str, priority: u8) {
        self.calls.push(ScriptCall::Request {
            target: target.to_string(),
            event: event.to_string(),
            priority,
        });
    }

    fn continue_execution(&mut self, token: ContinuationToken) {
        self.calls.push(ScriptCall::Continue(token));
    }
}

/// Per-actor waiters. Tokens leave the queue when resumed, so each is
/// resumed at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuationQueue {
    entries: Vec<(ActionKind, ContinuationToken)>,
}

impl ContinuationQueue {
    pub fn enqueue(&mut self, kind: ActionKind, token: ContinuationToken) {
        self.entries.push((kind, token));
    }

    pub fn pending(&self, kind: ActionKind) -> usize {
        self.entries
            .iter()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes and resumes every waiter on `kind`, in registration order.
    pub fn resume(&mut self, kind: ActionKind, host: &mut dyn ScriptHost) -> usize {
        let mut resumed = 0usize;
        self.entries.retain(|(entry_kind, token)| {
            if *entry_kind != kind {
                return true;
            }
            host.continue_execution(*token);
            resumed += 1;
            false
        });
        resumed
    }
}

/// Counts traffic to the wrapped host for tick statistics.
pub(crate) struct CountingHost<'a> {
    inner: &'a mut dyn ScriptHost,
    pub(crate) requests: u32,
    pub(crate) continuations: u32,
}

impl<'a> CountingHost<'a> {
    pub(crate) fn new(inner: &'a mut dyn ScriptHost) -> Self {
        Self {
            inner,
            requests: 0,
            continuations: 0,
        }
    }
}

impl ScriptHost for CountingHost<'_> {
    fn request_script(&mut self, target: &str, event: &str, priority: u8) {
        self.requests = self.requests.saturating_add(1);
        self.inner.request_script(target, event, priority);
    }

    fn continue_execution(&mut self, token: ContinuationToken) {
        self.continuations = self.continuations.saturating_add(1);
        self.inner.continue_execution(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_drains_only_matching_kind_in_order() {
        let mut queue = ContinuationQueue::default();
        queue.enqueue(ActionKind::Move, ContinuationToken(1));
        queue.enqueue(ActionKind::Turn, ContinuationToken(2));
        queue.enqueue(ActionKind::Move, ContinuationToken(3));

        let mut host = RecordingScriptHost::default();
        assert_eq!(queue.resume(ActionKind::Move, &mut host), 2);
        assert_eq!(
            host.resumed_tokens(),
            vec![ContinuationToken(1), ContinuationToken(3)]
        );
        assert_eq!(queue.pending(ActionKind::Turn), 1);
        assert_eq!(queue.pending(ActionKind::Move), 0);
    }

    #[test]
    fn resumed_tokens_are_never_resumed_twice() {
        let mut queue = ContinuationQueue::default();
        queue.enqueue(ActionKind::Jump, ContinuationToken(9));
        let mut host = RecordingScriptHost::default();
        queue.resume(ActionKind::Jump, &mut host);
        queue.resume(ActionKind::Jump, &mut host);
        assert_eq!(host.resumed_tokens(), vec![ContinuationToken(9)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn counting_host_forwards_and_counts() {
        let mut recorder = RecordingScriptHost::default();
        {
            let mut counting = CountingHost::new(&mut recorder);
            counting.request_script("line_a", "on_cross", 1);
            counting.continue_execution(ContinuationToken(4));
            assert_eq!(counting.requests, 1);
            assert_eq!(counting.continuations, 1);
        }
        assert_eq!(recorder.calls().len(), 2);
    }
}
