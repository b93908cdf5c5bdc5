//! A deterministic oracle for tests and offline rehearsal.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::bail;

use super::Oracle;

/// Replays a fixed queue of canned replies, one per `complete` call.
///
/// An exhausted queue is an invocation error, which exercises the same
/// fallback paths a real service outage would.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    /// Queue one more reply.
    pub fn push(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => Ok(reply),
            None => bail!("scripted oracle has no replies left"),
        }
    }
}
