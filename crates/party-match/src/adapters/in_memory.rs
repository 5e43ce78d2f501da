//! In-memory collaborators
//!
//! Single-process stand-ins for the friend/block store and the
//! notification service.

use async_trait::async_trait;
use parking_lot::RwLock;
use party_types::UserId;
use std::collections::HashMap;
use tracing::debug;

use crate::error::DependencyError;
use crate::ports::{BlockedPage, Notification, NotificationService, SocialGraph};

/// Block relations held in memory. Cursors are stringified offsets.
#[derive(Debug, Default)]
pub struct InMemorySocialGraph {
    blocked: RwLock<HashMap<UserId, Vec<UserId>>>,
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `user_id` blocks `target`.
    pub fn block(&self, user_id: UserId, target: UserId) {
        let mut blocked = self.blocked.write();
        let list = blocked.entry(user_id).or_default();
        if !list.contains(&target) {
            list.push(target);
        }
    }

    pub fn unblock(&self, user_id: &UserId, target: &UserId) {
        if let Some(list) = self.blocked.write().get_mut(user_id) {
            list.retain(|u| u != target);
        }
    }
}

#[async_trait]
impl SocialGraph for InMemorySocialGraph {
    async fn list_blocked(
        &self,
        user_id: &UserId,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<BlockedPage, DependencyError> {
        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| DependencyError::Rejected(format!("invalid cursor {cursor}")))?,
            None => 0,
        };

        let blocked = self.blocked.read();
        let all = blocked.get(user_id).map(Vec::as_slice).unwrap_or_default();
        let end = offset.saturating_add(limit).min(all.len());
        let users = all.get(offset..end).unwrap_or_default().to_vec();
        let cursor = (end < all.len()).then(|| end.to_string());

        Ok(BlockedPage { users, cursor })
    }
}

/// Keeps every sent notification in a per-user inbox.
#[derive(Debug, Default)]
pub struct InMemoryNotificationService {
    inboxes: RwLock<HashMap<UserId, Vec<Notification>>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything delivered to `user_id`.
    pub fn drain(&self, user_id: &UserId) -> Vec<Notification> {
        self.inboxes.write().remove(user_id).unwrap_or_default()
    }

    pub fn inbox(&self, user_id: &UserId) -> Vec<Notification> {
        self.inboxes
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every stored notification, in no particular order.
    pub fn all(&self) -> Vec<Notification> {
        self.inboxes.read().values().flatten().cloned().collect()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, notification: Notification) -> Result<(), DependencyError> {
        debug!(user_id = %notification.recipient, subject = %notification.subject, "Notification stored");
        self.inboxes
            .write()
            .entry(notification.recipient.clone())
            .or_default()
            .push(notification);
        Ok(())
    }

    async fn send_all(&self, notifications: Vec<Notification>) -> Result<(), DependencyError> {
        for notification in notifications {
            self.send(notification).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_blocked_list_pages() {
        let graph = InMemorySocialGraph::new();
        for i in 0..5 {
            graph.block(UserId::from("u1"), UserId::from(format!("b{i}").as_str()));
        }

        let first = graph.list_blocked(&UserId::from("u1"), 2, None).await.unwrap();
        assert_eq!(first.users.len(), 2);
        assert_eq!(first.cursor.as_deref(), Some("2"));

        let last = graph
            .list_blocked(&UserId::from("u1"), 10, first.cursor)
            .await
            .unwrap();
        assert_eq!(last.users.len(), 3);
        assert!(last.cursor.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_list() {
        let graph = InMemorySocialGraph::new();
        let page = graph.list_blocked(&UserId::from("x"), 100, None).await.unwrap();
        assert_eq!(page, BlockedPage::default());
    }

    #[tokio::test]
    async fn test_bad_cursor_rejected() {
        let graph = InMemorySocialGraph::new();
        let result = graph
            .list_blocked(&UserId::from("x"), 100, Some("abc".into()))
            .await;
        assert!(matches!(result, Err(DependencyError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_notifications_land_in_inbox() {
        let service = InMemoryNotificationService::new();
        let note = Notification::party(UserId::from("u2"), "Party invitation", json!({}));
        service.send(note.clone()).await.unwrap();

        assert_eq!(service.inbox(&UserId::from("u2")), vec![note.clone()]);
        assert_eq!(service.drain(&UserId::from("u2")), vec![note]);
        assert!(service.inbox(&UserId::from("u2")).is_empty());
    }
}
