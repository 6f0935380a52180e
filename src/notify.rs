// TubeFetch - Video Downloads for Android
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Download notifications
//!
//! Workers talk to a [`Notifier`] on a single [`NotificationChannel`] that is
//! created once at startup and handed down explicitly. On Android the
//! [`NotificationBoard`] collects the latest state per notification id and the
//! Kotlin side drains it into `NotificationManagerCompat`.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Android notification importance levels the channel can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Default,
    High,
}

/// Notification channel handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
}

impl NotificationChannel {
    /// The one channel all download notifications are posted on
    pub fn downloads() -> Self {
        Self {
            id: "tubefetch_downloads".to_string(),
            name: "Downloads".to_string(),
            importance: Importance::Low,
        }
    }
}

/// What a download notification currently shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// `progress` is None while the length is unknown (indeterminate bar)
    Ongoing { title: String, progress: Option<f64> },
    Completed { title: String, file_size: String },
    Failed { title: String, reason: String },
    Paused { title: String },
}

impl Notification {
    pub fn title(&self) -> &str {
        match self {
            Notification::Ongoing { title, .. }
            | Notification::Completed { title, .. }
            | Notification::Failed { title, .. }
            | Notification::Paused { title } => title,
        }
    }
}

/// Sink for download notifications
pub trait Notifier: Send + Sync {
    /// Post or replace the notification with this id
    fn post(&self, channel: &NotificationChannel, notification_id: i32, notification: Notification);

    fn cancel(&self, notification_id: i32);
}

/// Stable notification id for a record
///
/// FNV-1a over the id bytes, masked to a non-negative `i32` so Android accepts it.
pub fn notification_id_for(record_id: &str) -> i32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = record_id
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ byte as u32).wrapping_mul(PRIME));

    (hash & 0x7fff_ffff) as i32
}

/// Notifier that writes to the log facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn post(&self, channel: &NotificationChannel, notification_id: i32, notification: Notification) {
        match &notification {
            Notification::Ongoing { title, progress: Some(p) } => {
                log::debug!("[{}#{}] {} {:.0}%", channel.id, notification_id, title, p * 100.0)
            }
            Notification::Ongoing { title, progress: None } => {
                log::debug!("[{}#{}] {} downloading", channel.id, notification_id, title)
            }
            Notification::Completed { title, file_size } => {
                log::info!("[{}#{}] Download complete: {} ({})", channel.id, notification_id, title, file_size)
            }
            Notification::Failed { title, reason } => {
                log::error!("[{}#{}] Download failed: {}: {}", channel.id, notification_id, title, reason)
            }
            Notification::Paused { title } => {
                log::info!("[{}#{}] Download paused: {}", channel.id, notification_id, title)
            }
        }
    }

    fn cancel(&self, notification_id: i32) {
        log::debug!("Cancelled notification #{}", notification_id);
    }
}

/// Pending change for one notification id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationUpdate {
    pub notification_id: i32,
    pub channel_id: String,
    /// None means the notification was cancelled
    pub notification: Option<Notification>,
}

/// Collects the latest notification state per id until drained
#[derive(Debug, Default)]
pub struct NotificationBoard {
    pending: Mutex<Vec<NotificationUpdate>>,
}

impl NotificationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert(&self, update: NotificationUpdate) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending
            .iter_mut()
            .find(|u| u.notification_id == update.notification_id)
        {
            Some(existing) => *existing = update,
            None => pending.push(update),
        }
    }

    /// Take all pending updates, oldest id first
    pub fn drain(&self) -> Vec<NotificationUpdate> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    /// Latest pending state for an id, without draining
    pub fn peek(&self, notification_id: i32) -> Option<NotificationUpdate> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending
            .iter()
            .find(|u| u.notification_id == notification_id)
            .cloned()
    }
}

impl Notifier for NotificationBoard {
    fn post(&self, channel: &NotificationChannel, notification_id: i32, notification: Notification) {
        self.upsert(NotificationUpdate {
            notification_id,
            channel_id: channel.id.clone(),
            notification: Some(notification),
        });
    }

    fn cancel(&self, notification_id: i32) {
        self.upsert(NotificationUpdate {
            notification_id,
            channel_id: NotificationChannel::downloads().id,
            notification: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_id_is_stable_and_positive() {
        let id = "3f2b8c1e-9d4a-4c6b-8e2f-1a2b3c4d5e6f";
        assert_eq!(notification_id_for(id), notification_id_for(id));
        assert!(notification_id_for(id) >= 0);
        assert_ne!(notification_id_for("a"), notification_id_for("b"));
        // FNV-1a of the empty string is the offset basis, masked
        assert_eq!(notification_id_for(""), 0x011c_9dc5);
    }

    #[test]
    fn test_downloads_channel() {
        let channel = NotificationChannel::downloads();
        assert_eq!(channel.id, "tubefetch_downloads");
        assert_eq!(channel.name, "Downloads");
        assert_eq!(channel.importance, Importance::Low);
    }

    #[test]
    fn test_board_keeps_latest_per_id() {
        let board = NotificationBoard::new();
        let channel = NotificationChannel::downloads();

        board.post(&channel, 1, Notification::Ongoing { title: "A".into(), progress: None });
        board.post(&channel, 2, Notification::Ongoing { title: "B".into(), progress: Some(0.1) });
        board.post(&channel, 1, Notification::Completed { title: "A".into(), file_size: "1.0 MB".into() });

        let updates = board.drain();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].notification_id, 1);
        assert!(matches!(updates[0].notification, Some(Notification::Completed { .. })));

        let second = updates[1].notification.as_ref().unwrap();
        assert_eq!(second.title(), "B");
        assert!(matches!(second, Notification::Ongoing { progress: Some(_), .. }));
        assert!(board.drain().is_empty());
    }

    #[test]
    fn test_board_records_cancel() {
        let board = NotificationBoard::new();
        board.post(
            &NotificationChannel::downloads(),
            7,
            Notification::Paused { title: "A".into() },
        );
        board.cancel(7);
        assert_eq!(board.peek(7).unwrap().notification, None);
    }

    #[test]
    fn test_notification_serializes_tagged() {
        let json = serde_json::to_string(&Notification::Failed {
            title: "A".into(),
            reason: "HTTP 404".into(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"failed\""));
    }
}
