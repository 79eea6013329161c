
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::UserId;

/// Opaque id of one live WebSocket session.
pub type ConnectionId = Uuid;

/// Which live connections each user currently holds.
///
/// Not synchronized: it is owned by the `ChatServer` actor, whose mailbox
/// serializes every register/unregister/resolve.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    owners: HashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` to `user_id`'s set. A handle already owned by another
    /// user is moved over.
    pub fn register(&mut self, user_id: UserId, handle: ConnectionId) {
        if let Some(previous) = self.owners.insert(handle, user_id) {
            if previous != user_id {
                self.detach(previous, handle);
            }
        }
        self.by_user.entry(user_id).or_default().insert(handle);
    }

    /// Returns the user that held `handle`, if any.
    pub fn unregister(&mut self, handle: ConnectionId) -> Option<UserId> {
        let user_id = self.owners.remove(&handle)?;
        self.detach(user_id, handle);
        Some(user_id)
    }

    /// Empty means offline, not an error.
    pub fn resolve(&self, user_id: UserId) -> HashSet<ConnectionId> {
        self.by_user.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }

    fn detach(&mut self, user_id: UserId, handle: ConnectionId) {
        if let Some(handles) = self.by_user.get_mut(&user_id) {
            handles.remove(&handle);
            if handles.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistering_one_device_keeps_the_other() {
        let mut registry = ConnectionRegistry::new();
        let (h1, h2) = (Uuid::new_v4(), Uuid::new_v4());

        registry.register(7, h1);
        registry.register(7, h2);
        assert_eq!(registry.unregister(h1), Some(7));

        assert_eq!(registry.resolve(7), HashSet::from([h2]));
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let h = Uuid::new_v4();

        registry.register(7, h);
        registry.register(7, h);

        assert_eq!(registry.resolve(7).len(), 1);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn unknown_handle_and_offline_user_are_not_errors() {
        let mut registry = ConnectionRegistry::new();

        assert_eq!(registry.unregister(Uuid::new_v4()), None);
        assert!(registry.resolve(42).is_empty());
    }

    #[test]
    fn last_handle_gone_means_offline() {
        let mut registry = ConnectionRegistry::new();
        let h = Uuid::new_v4();

        registry.register(9, h);
        assert_eq!(registry.resolve(9).len(), 1);
        registry.unregister(h);

        assert!(registry.resolve(9).is_empty());
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn handle_reauthenticated_as_another_user_moves() {
        let mut registry = ConnectionRegistry::new();
        let h = Uuid::new_v4();

        registry.register(7, h);
        registry.register(9, h);

        assert!(registry.resolve(7).is_empty());
        assert_eq!(registry.resolve(9), HashSet::from([h]));
        assert_eq!(registry.unregister(h), Some(9));
    }
}
