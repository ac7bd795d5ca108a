//! Per-project log streams with live fan-out.
//!
//! Every project gets an append-only list of progress lines. Subscribers
//! first receive the lines recorded so far (the backlog) and then every
//! line appended afterwards, until the stream is closed.
//!
//! # Backpressure
//!
//! Live delivery never blocks the producer. Each subscriber owns a bounded
//! channel of [`SUBSCRIBER_CAPACITY`] lines; when it is full the line is
//! dropped for that subscriber only. A subscriber that cannot keep up
//! therefore sees a gap, while the pipeline keeps running at full speed.
//! The same bound applies while a new subscriber is still replaying its
//! backlog: at most [`SUBSCRIBER_CAPACITY`] live lines wait behind it.
//!
//! # Locking
//!
//! The registry lock only guards creation of a project's stream. Each
//! stream carries its own lock, so projects never contend with each other.
//! Neither lock is held across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::domain::ProjectId;

/// Pending-line capacity of a single subscriber channel
pub const SUBSCRIBER_CAPACITY: usize = 10;

/// Registry of log streams, one per project
#[derive(Default)]
pub struct LogBroadcaster {
    streams: Mutex<HashMap<ProjectId, Arc<LogStream>>>,
}

#[derive(Default)]
struct LogStream {
    state: Mutex<StreamState>,
}

#[derive(Default)]
struct StreamState {
    lines: Vec<String>,
    subscribers: Vec<Subscriber>,
    closed: bool,
    next_subscriber: u64,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<String>,
    /// Lines waiting to be replayed; `None` once live delivery has started
    replay: Option<Replay>,
}

/// Pending lines of a subscriber that has not caught up yet
struct Replay {
    /// Snapshot taken at subscribe time, delivered in full
    backlog: VecDeque<String>,
    /// Lines appended since, bounded like the live channel
    live: VecDeque<String>,
}

impl Replay {
    fn next(&mut self) -> Option<String> {
        self.backlog.pop_front().or_else(|| self.live.pop_front())
    }

    fn len(&self) -> usize {
        self.backlog.len() + self.live.len()
    }
}

impl Subscriber {
    /// Hand a new line to this subscriber. Returns false when the receiver
    /// is gone and the subscriber should be removed.
    fn offer(&mut self, line: &str) -> bool {
        if let Some(replay) = self.replay.as_mut() {
            if replay.live.len() >= SUBSCRIBER_CAPACITY {
                debug!(subscriber = self.id, "Subscriber still replaying, dropping log line");
            } else {
                replay.live.push_back(line.to_string());
            }
            return true;
        }

        match self.tx.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(subscriber = self.id, "Subscriber channel full, dropping log line");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl LogStream {
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create the stream for a project
    fn stream(&self, id: ProjectId) -> Arc<LogStream> {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(streams.entry(id).or_default())
    }

    /// Look up a stream without creating it
    fn existing(&self, id: ProjectId) -> Option<Arc<LogStream>> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.get(&id).cloned()
    }

    /// Append a line and deliver it to current subscribers.
    ///
    /// No-op once the stream is closed.
    pub fn append(&self, id: ProjectId, line: impl Into<String>) {
        let stream = self.stream(id);
        let mut state = stream.lock();
        if state.closed {
            return;
        }

        let line = line.into();
        state.subscribers.retain_mut(|sub| sub.offer(&line));
        state.lines.push(line);
    }

    /// Open a subscription: backlog first, then live lines, then end-of-stream.
    ///
    /// The backlog is replayed on a spawned task, so this must be called from
    /// within a Tokio runtime. A stream that is already closed yields
    /// end-of-stream immediately, without replaying its backlog; use
    /// [`get_logs`](Self::get_logs) to read a finished project's history.
    pub fn subscribe(&self, id: ProjectId) -> LogSubscription {
        let stream = self.stream(id);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);

        let mut state = stream.lock();
        if state.closed {
            // tx is dropped here, which ends the subscription
            return LogSubscription { rx };
        }

        let sub_id = state.next_subscriber;
        state.next_subscriber += 1;

        if state.lines.is_empty() {
            state.subscribers.push(Subscriber {
                id: sub_id,
                tx,
                replay: None,
            });
            return LogSubscription { rx };
        }

        let backlog: VecDeque<String> = state.lines.iter().cloned().collect();
        state.subscribers.push(Subscriber {
            id: sub_id,
            tx,
            replay: Some(Replay {
                backlog,
                live: VecDeque::new(),
            }),
        });
        drop(state);

        tokio::spawn(replay_backlog(stream, sub_id));

        LogSubscription { rx }
    }

    /// Close the stream and signal end-of-stream to every subscriber.
    ///
    /// Idempotent. Subscribers still replaying their backlog receive the
    /// lines already queued for them before the end-of-stream.
    pub fn close(&self, id: ProjectId) {
        let stream = self.stream(id);
        let mut state = stream.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        // Dropping a live subscriber's sender ends its stream; replaying ones
        // are removed by their replay task once drained.
        state.subscribers.retain(|sub| sub.replay.is_some());
    }

    /// Snapshot of all lines recorded for a project
    pub fn get_logs(&self, id: ProjectId) -> Vec<String> {
        self.existing(id)
            .map(|stream| stream.lock().lines.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self, id: ProjectId) -> bool {
        self.existing(id).is_some_and(|stream| stream.lock().closed)
    }
}

/// Feed a subscriber its queued lines, then switch it to live delivery
async fn replay_backlog(stream: Arc<LogStream>, subscriber: u64) {
    loop {
        let (tx, line) = {
            let mut state = stream.lock();
            let closed = state.closed;
            let Some(pos) = state.subscribers.iter().position(|s| s.id == subscriber) else {
                return;
            };

            let sub = &mut state.subscribers[pos];
            let next = sub.replay.as_mut().and_then(Replay::next);
            match next {
                Some(line) => (sub.tx.clone(), line),
                None if closed => {
                    state.subscribers.swap_remove(pos);
                    return;
                }
                None => {
                    state.subscribers[pos].replay = None;
                    return;
                }
            }
        };

        if tx.send(line).await.is_err() {
            stream.lock().subscribers.retain(|s| s.id != subscriber);
            return;
        }
    }
}

/// Receiving end of a project log subscription
#[derive(Debug)]
pub struct LogSubscription {
    rx: mpsc::Receiver<String>,
}

impl LogSubscription {
    /// Next line, or `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain every remaining line until end-of-stream
    pub async fn collect_all(mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.rx.recv().await {
            lines.push(line);
        }
        lines
    }
}
