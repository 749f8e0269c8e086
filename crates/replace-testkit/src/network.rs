//! In-memory message network
//!
//! Messages are queued per (recipient, topic, session) mailbox. A receiver
//! parks on the mailbox's [`Notify`] until something arrives, so tests never
//! poll. Nodes can be isolated to simulate a peer that never answers.

use parking_lot::Mutex;
use replace_core::{SessionId, Topic};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

type MailboxKey = (String, Topic, SessionId);

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Vec<u8>>,
    notify: Arc<Notify>,
}

/// Record of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub from: String,
    pub to: String,
    pub topic: Topic,
    pub session_id: SessionId,
    pub len: usize,
    /// `false` when the message was dropped because an end was isolated
    pub delivered: bool,
}

#[derive(Default)]
struct NetworkState {
    mailboxes: HashMap<MailboxKey, Mailbox>,
    sent: Vec<SentMessage>,
    isolated: HashSet<String>,
}

/// Shared in-process network connecting every node of a test
#[derive(Default)]
pub struct InMemoryNetwork {
    state: Mutex<NetworkState>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `payload` for `to`, unless either end is isolated
    pub fn deliver(
        &self,
        from: &str,
        to: &str,
        topic: Topic,
        session_id: SessionId,
        payload: Vec<u8>,
    ) {
        let mut state = self.state.lock();
        let delivered = !state.isolated.contains(from) && !state.isolated.contains(to);
        state.sent.push(SentMessage {
            from: from.to_string(),
            to: to.to_string(),
            topic,
            session_id,
            len: payload.len(),
            delivered,
        });
        if !delivered {
            trace!(from, to, %topic, %session_id, "dropped at isolated node");
            return;
        }
        let mailbox = state
            .mailboxes
            .entry((to.to_string(), topic, session_id))
            .or_default();
        mailbox.queue.push_back(payload);
        mailbox.notify.notify_one();
    }

    /// Wait for the next message in a mailbox
    pub async fn take(&self, recipient: &str, topic: Topic, session_id: SessionId) -> Vec<u8> {
        loop {
            let notify = {
                let mut state = self.state.lock();
                let mailbox = state
                    .mailboxes
                    .entry((recipient.to_string(), topic, session_id))
                    .or_default();
                if let Some(payload) = mailbox.queue.pop_front() {
                    return payload;
                }
                Arc::clone(&mailbox.notify)
            };
            notify.notified().await;
        }
    }

    /// Drop all traffic to and from `name` from now on
    pub fn isolate(&self, name: &str) {
        self.state.lock().isolated.insert(name.to_string());
    }

    /// Messages queued and not yet taken for `recipient`
    pub fn pending(&self, recipient: &str) -> usize {
        self.state
            .lock()
            .mailboxes
            .iter()
            .filter(|((to, _, _), _)| to == recipient)
            .map(|(_, mailbox)| mailbox.queue.len())
            .sum()
    }

    /// Every delivery attempt so far, in order
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Delivery attempts from `from` to `to`
    pub fn sent_between(&self, from: &str, to: &str) -> Vec<SentMessage> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|msg| msg.from == from && msg.to == to)
            .cloned()
            .collect()
    }
}
