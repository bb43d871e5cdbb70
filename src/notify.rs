use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{Ms, now_ms};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Success,
    Warning,
    Error,
    Info,
}

impl NotifyKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotifyKind::Success => "success",
            NotifyKind::Warning => "warning",
            NotifyKind::Error => "error",
            NotifyKind::Info => "info",
        }
    }
}

/// A structured notification event. Delivered to the in-memory list and to
/// any live broadcast subscriber (the host platform surface, when present).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Ulid,
    pub kind: NotifyKind,
    pub title: String,
    pub message: String,
    pub booking_id: Option<Ulid>,
    pub at: Ms,
    pub read: bool,
}

/// In-memory notification side channel with unread tracking. Newest first,
/// matching the original feed order.
pub struct NotificationCenter {
    entries: RwLock<Vec<Notification>>,
    tx: broadcast::Sender<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Record a notification and fan it out. Broadcast is best-effort: a
    /// missing subscriber is a no-op.
    pub fn push(
        &self,
        kind: NotifyKind,
        title: impl Into<String>,
        message: impl Into<String>,
        booking_id: Option<Ulid>,
    ) -> Ulid {
        let n = Notification {
            id: Ulid::new(),
            kind,
            title: title.into(),
            message: message.into(),
            booking_id,
            at: now_ms(),
            read: false,
        };
        metrics::counter!(crate::observability::NOTIFICATIONS_TOTAL, "kind" => kind.label())
            .increment(1);
        let _ = self.tx.send(n.clone());
        let mut entries = self.entries.write().expect("notification list poisoned");
        let id = n.id;
        entries.insert(0, n);
        id
    }

    /// Subscribe to live notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn list(&self) -> Vec<Notification> {
        self.entries.read().expect("notification list poisoned").clone()
    }

    pub fn unread_count(&self) -> usize {
        self.entries
            .read()
            .expect("notification list poisoned")
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn mark_read(&self, id: Ulid) {
        let mut entries = self.entries.write().expect("notification list poisoned");
        if let Some(n) = entries.iter_mut().find(|n| n.id == id) {
            n.read = true;
        }
    }

    pub fn mark_all_read(&self) {
        let mut entries = self.entries.write().expect("notification list poisoned");
        for n in entries.iter_mut() {
            n.read = true;
        }
    }

    pub fn clear(&self) {
        self.entries.write().expect("notification list poisoned").clear();
    }
}
