use crate::{parse_reply, DeviceClient, Reply, Result};
use std::collections::{HashMap, VecDeque};

/// A scripted in-process client. Each instance is independent.
///
/// Commands registered with [`MockClient::respond_to`] get their reply whenever they are
/// seen; anything else consumes the next queued reply, falling back to an empty
/// multiline reply so change polling stays quiet.
#[derive(Debug, Default)]
pub struct MockClient {
    sent: Vec<String>,
    responses: HashMap<String, String>,
    queue: VecDeque<String>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(&mut self, command: impl Into<String>, raw_reply: impl Into<String>) {
        self.responses.insert(command.into(), raw_reply.into());
    }

    pub fn enqueue(&mut self, raw_reply: impl Into<String>) {
        self.queue.push_back(raw_reply.into());
    }

    /// Every command sent so far, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl DeviceClient for MockClient {
    fn send(&mut self, command: &str) -> Result<Reply> {
        self.sent.push(command.to_string());
        let raw = match self.responses.get(command) {
            Some(r) => r.clone(),
            None => self.queue.pop_front().unwrap_or_else(|| ".".to_string()),
        };
        tracing::trace!(command, reply = %raw, "mock reply");
        parse_reply(&raw)
    }
}
