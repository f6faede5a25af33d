//! Messaging surface the cart talks through.
//!
//! The cart never renders embeds or registers commands; it only needs to post text,
//! edit or delete it, and wait for a player's reaction or typed reply. [`Surface`]
//! captures exactly that. [`LocalSurface`] is an in-process implementation: the
//! console binary feeds it from stdin and the integration tests feed it directly.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::cart::errors::SurfaceError;
use crate::cart::types::{ChannelId, MessageId, MessageRef, Reaction, Reply, UserId};

pub type ReactionFilter = Box<dyn Fn(&Reaction) -> bool + Send + Sync>;
pub type ReplyFilter = Box<dyn Fn(&Reply) -> bool + Send + Sync>;

#[async_trait]
pub trait Surface: Send + Sync {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef, SurfaceError>;

    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), SurfaceError>;

    /// Remove a message. Deleting a message that is already gone is not an error.
    async fn delete(&self, message: &MessageRef) -> Result<(), SurfaceError>;

    /// Wait up to `timeout` for a reaction accepted by `filter`.
    async fn await_reaction(&self, filter: ReactionFilter, timeout: Duration) -> Option<Reaction>;

    /// Wait up to `timeout` for a typed message accepted by `filter`.
    async fn await_message(&self, filter: ReplyFilter, timeout: Duration) -> Option<Reply>;
}

/// Something that happened on a [`LocalSurface`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceRecord {
    Sent { message: MessageRef, text: String },
    Edited { message: MessageRef, text: String },
    Deleted { message: MessageRef },
}

/// Reactions or replies on their way to waiters.
///
/// An event only reaches waiters that were already listening when it arrived, the
/// way a chat client only hears what is said after it starts listening. Events that
/// arrive with nobody listening are dropped, and whatever the oldest waiter can no
/// longer take is pruned when a waiter leaves.
struct Mailbox<T> {
    next_seq: u64,
    queue: VecDeque<(u64, T)>,
    /// Start sequence of each active waiter, with a count per start.
    waiters: BTreeMap<u64, usize>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            queue: VecDeque::new(),
            waiters: BTreeMap::new(),
        }
    }
}

impl<T> Mailbox<T> {
    fn register(&mut self) -> u64 {
        let start = self.next_seq;
        *self.waiters.entry(start).or_default() += 1;
        start
    }

    fn deregister(&mut self, start: u64) {
        if let Some(count) = self.waiters.get_mut(&start) {
            *count -= 1;
            if *count == 0 {
                self.waiters.remove(&start);
            }
        }
        match self.waiters.keys().next() {
            Some(&oldest) => self.queue.retain(|(seq, _)| *seq >= oldest),
            None => self.queue.clear(),
        }
    }

    /// Queue `item` for current waiters. Returns false when nobody is listening.
    fn push(&mut self, item: T) -> bool {
        if self.waiters.is_empty() {
            return false;
        }
        self.queue.push_back((self.next_seq, item));
        self.next_seq += 1;
        true
    }

    fn take(&mut self, start: u64, filter: impl Fn(&T) -> bool) -> Option<T> {
        let pos = self
            .queue
            .iter()
            .position(|(seq, item)| *seq >= start && filter(item))?;
        self.queue.remove(pos).map(|(_, item)| item)
    }

    fn waiting(&self) -> usize {
        self.waiters.values().sum()
    }
}

/// Leaves the mailbox when the wait ends, including when the waiting future is dropped.
struct Listening<'a, T> {
    mailbox: &'a Mutex<Mailbox<T>>,
    start: u64,
}

impl<T> Drop for Listening<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut mailbox) = self.mailbox.lock() {
            mailbox.deregister(self.start);
        }
    }
}

/// In-process surface with injectable reactions and replies.
///
/// Injected reactions and replies are only delivered to waiters that were already
/// waiting when they were injected.
pub struct LocalSurface {
    next_id: AtomicU64,
    echo: bool,
    live: Mutex<BTreeMap<MessageId, (ChannelId, String)>>,
    history: Mutex<Vec<SurfaceRecord>>,
    reactions: Mutex<Mailbox<Reaction>>,
    replies: Mutex<Mailbox<Reply>>,
    arrivals: Notify,
}

impl Default for LocalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSurface {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            echo: false,
            live: Mutex::new(BTreeMap::new()),
            history: Mutex::new(Vec::new()),
            reactions: Mutex::new(Mailbox::default()),
            replies: Mutex::new(Mailbox::default()),
            arrivals: Notify::new(),
        }
    }

    /// Print every send/edit/delete to stdout (console mode).
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn allocate(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, entry: SurfaceRecord) {
        if self.echo {
            match &entry {
                SurfaceRecord::Sent { message, text } => {
                    println!("[#{} msg {}] {}", message.channel, message.id, text)
                }
                SurfaceRecord::Edited { message, text } => {
                    println!("[#{} msg {} edited] {}", message.channel, message.id, text)
                }
                SurfaceRecord::Deleted { message } => {
                    println!("[#{} msg {} deleted]", message.channel, message.id)
                }
            }
        }
        if let Ok(mut history) = self.history.lock() {
            history.push(entry);
        }
    }

    /// React as a player would. Returns whether anyone was waiting for reactions.
    pub fn inject_reaction(&self, reaction: Reaction) -> bool {
        let heard = self
            .reactions
            .lock()
            .map(|mut mailbox| mailbox.push(reaction))
            .unwrap_or(false);
        self.arrivals.notify_waiters();
        heard
    }

    /// Post a player message into `channel`. Only waiters already listening for
    /// replies can receive it.
    pub fn inject_reply(&self, channel: ChannelId, author: UserId, content: &str) -> MessageRef {
        let message = MessageRef {
            channel,
            id: self.allocate(),
        };
        if let Ok(mut live) = self.live.lock() {
            live.insert(message.id, (channel, content.to_string()));
        }
        let heard = self
            .replies
            .lock()
            .map(|mut mailbox| {
                mailbox.push(Reply {
                    message,
                    author,
                    content: content.to_string(),
                })
            })
            .unwrap_or(false);
        if !heard {
            log::trace!("message {} in channel {} had no listener", message.id, channel);
        }
        self.arrivals.notify_waiters();
        message
    }

    /// Number of reply waiters currently listening.
    pub fn reply_waiters(&self) -> usize {
        self.replies.lock().map(|m| m.waiting()).unwrap_or(0)
    }

    /// Replies held for current waiters.
    pub fn queued_replies(&self) -> usize {
        self.replies.lock().map(|m| m.queue.len()).unwrap_or(0)
    }

    pub fn history(&self) -> Vec<SurfaceRecord> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Texts of every message the cart sent, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.history()
            .into_iter()
            .filter_map(|r| match r {
                SurfaceRecord::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn is_live(&self, message: &MessageRef) -> bool {
        self.live
            .lock()
            .map(|live| live.contains_key(&message.id))
            .unwrap_or(false)
    }

    /// Current text of a live message.
    pub fn text_of(&self, message: &MessageRef) -> Option<String> {
        self.live
            .lock()
            .ok()
            .and_then(|live| live.get(&message.id).map(|(_, text)| text.clone()))
    }

    async fn wait_for<T>(
        &self,
        mailbox: &Mutex<Mailbox<T>>,
        filter: impl Fn(&T) -> bool,
        timeout: Duration,
    ) -> Option<T> {
        let start = mailbox.lock().ok()?.register();
        let _listening = Listening { mailbox, start };
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let found = mailbox.lock().ok()?.take(start, &filter);
            if found.is_some() {
                return found;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }
}

#[async_trait]
impl Surface for LocalSurface {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef, SurfaceError> {
        let message = MessageRef {
            channel,
            id: self.allocate(),
        };
        self.live
            .lock()
            .map_err(|e| SurfaceError::Other(e.to_string()))?
            .insert(message.id, (channel, text.to_string()));
        self.record(SurfaceRecord::Sent {
            message,
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), SurfaceError> {
        {
            let mut live = self
                .live
                .lock()
                .map_err(|e| SurfaceError::Other(e.to_string()))?;
            let entry = live
                .get_mut(&message.id)
                .ok_or(SurfaceError::NotFound(message.id.get()))?;
            entry.1 = text.to_string();
        }
        self.record(SurfaceRecord::Edited {
            message: *message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, message: &MessageRef) -> Result<(), SurfaceError> {
        let removed = self
            .live
            .lock()
            .map_err(|e| SurfaceError::Other(e.to_string()))?
            .remove(&message.id);
        if removed.is_some() {
            self.record(SurfaceRecord::Deleted { message: *message });
        }
        Ok(())
    }

    async fn await_reaction(&self, filter: ReactionFilter, timeout: Duration) -> Option<Reaction> {
        self.wait_for(&self.reactions, |r| filter(r), timeout).await
    }

    async fn await_message(&self, filter: ReplyFilter, timeout: Duration) -> Option<Reply> {
        self.wait_for(&self.replies, |r| filter(r), timeout).await
    }
}
