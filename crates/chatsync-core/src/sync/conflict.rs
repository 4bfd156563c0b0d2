//! Conflict detection and resolution
//!
//! Chat messages are immutable once created, so a conflict only means a
//! message exists on one side and not (yet) on the other, or both sides hold
//! the same id with different creation timestamps. The newer timestamp wins;
//! content is never merged field by field.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{LocalMessage, MessageId, RemoteMessage, SyncPatch};

/// Last-write-wins resolver. Stateless and total over its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub const fn new() -> Self {
        Self
    }

    /// Classify local and remote snapshots into a bidirectional patch.
    ///
    /// Output lists are ordered by timestamp, then id.
    pub fn resolve(&self, local: &[LocalMessage], remote: &[RemoteMessage]) -> SyncPatch {
        let local_by_id: HashMap<&MessageId, &LocalMessage> =
            local.iter().map(|message| (&message.id, message)).collect();
        let remote_by_id: HashMap<&MessageId, &RemoteMessage> =
            remote.iter().map(|message| (&message.id, message)).collect();

        let mut patch = SyncPatch::default();

        for (id, remote_message) in &remote_by_id {
            match local_by_id.get(id) {
                None => patch.pull.push((*remote_message).clone()),
                Some(local_message) => {
                    match local_message.timestamp.cmp(&remote_message.timestamp) {
                        Ordering::Greater => patch.push.push((*local_message).clone()),
                        Ordering::Less => patch.pull.push((*remote_message).clone()),
                        // Already converged
                        Ordering::Equal => {}
                    }
                }
            }
        }

        for (id, local_message) in &local_by_id {
            if !remote_by_id.contains_key(id) {
                patch.push.push((*local_message).clone());
            }
        }

        patch
            .pull
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        patch
            .push
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn local(id: &str, content: &str, timestamp: i64) -> LocalMessage {
        LocalMessage {
            id: id.into(),
            content: content.to_string(),
            is_from_user: true,
            timestamp,
            is_synced: false,
        }
    }

    fn remote(id: &str, content: &str, timestamp: i64) -> RemoteMessage {
        RemoteMessage {
            id: id.into(),
            content: content.to_string(),
            is_from_user: true,
            timestamp,
        }
    }

    fn pull_ids(patch: &SyncPatch) -> Vec<&str> {
        patch.pull.iter().map(|message| message.id.as_str()).collect()
    }

    fn push_ids(patch: &SyncPatch) -> Vec<&str> {
        patch.push.iter().map(|message| message.id.as_str()).collect()
    }

    #[test]
    fn test_empty_inputs_produce_empty_patch() {
        let patch = ConflictResolver::new().resolve(&[], &[]);
        assert!(patch.pull.is_empty());
        assert!(patch.push.is_empty());
    }

    #[test]
    fn test_remote_only_message_is_pulled() {
        let patch = ConflictResolver::new().resolve(
            &[local("1", "Local message 1", 1000)],
            &[
                remote("1", "Local message 1", 1000),
                remote("2", "Remote message 2", 2000),
            ],
        );

        assert_eq!(pull_ids(&patch), vec!["2"]);
        assert!(patch.push.is_empty());
    }

    #[test]
    fn test_local_only_message_is_pushed() {
        let patch = ConflictResolver::new().resolve(
            &[
                local("1", "Local message 1", 1000),
                local("2", "Local message 2", 2000),
            ],
            &[remote("1", "Local message 1", 1000)],
        );

        assert!(patch.pull.is_empty());
        assert_eq!(push_ids(&patch), vec!["2"]);
    }

    #[test]
    fn test_timestamp_conflicts_newer_side_wins() {
        let patch = ConflictResolver::new().resolve(
            &[
                local("1", "Local version", 2000),
                local("2", "Same timestamp", 3000),
                local("3", "Older version", 1000),
            ],
            &[
                remote("1", "Remote version", 1000),
                remote("2", "Same timestamp", 3000),
                remote("3", "Newer version", 2000),
            ],
        );

        assert_eq!(pull_ids(&patch), vec!["3"]);
        assert_eq!(patch.pull[0].content, "Newer version");
        assert_eq!(push_ids(&patch), vec!["1"]);
        assert_eq!(patch.push[0].content, "Local version");
    }

    #[test]
    fn test_equal_timestamps_with_different_content_are_left_alone() {
        let patch = ConflictResolver::new().resolve(
            &[local("1", "mine", 1000)],
            &[remote("1", "theirs", 1000)],
        );
        assert!(patch.is_empty());
    }

    #[test]
    fn test_disjoint_ids_split_cleanly() {
        let locals: Vec<_> = (0..20)
            .map(|i| local(&format!("l{i}"), "local", 1000 + i))
            .collect();
        let remotes: Vec<_> = (0..15)
            .map(|i| remote(&format!("r{i}"), "remote", 500 + i))
            .collect();

        let patch = ConflictResolver::new().resolve(&locals, &remotes);

        assert_eq!(patch.push.len(), locals.len());
        assert_eq!(patch.pull.len(), remotes.len());

        let pushed: HashSet<_> = push_ids(&patch).into_iter().collect();
        let pulled: HashSet<_> = pull_ids(&patch).into_iter().collect();
        assert!(pushed.is_disjoint(&pulled));
        assert!(locals.iter().all(|m| pushed.contains(m.id.as_str())));
        assert!(remotes.iter().all(|m| pulled.contains(m.id.as_str())));
    }

    #[test]
    fn test_local_newer_scenario() {
        let patch = ConflictResolver::new()
            .resolve(&[local("id2", "new", 2000)], &[remote("id2", "old", 1000)]);
        assert_eq!(push_ids(&patch), vec!["id2"]);
        assert!(patch.pull.is_empty());
    }

    #[test]
    fn test_remote_only_scenario() {
        let patch = ConflictResolver::new().resolve(&[], &[remote("id3", "from server", 500)]);
        assert_eq!(pull_ids(&patch), vec!["id3"]);
        assert!(patch.push.is_empty());
    }

    #[test]
    fn test_local_only_scenario() {
        let patch = ConflictResolver::new().resolve(&[local("id1", "pending", 1000)], &[]);
        assert_eq!(push_ids(&patch), vec!["id1"]);
        assert!(patch.pull.is_empty());
    }

    #[test]
    fn test_inputs_are_not_mutated_and_output_is_ordered() {
        let locals = vec![local("b", "b", 30), local("a", "a", 30), local("c", "c", 10)];
        let before = locals.clone();

        let patch = ConflictResolver::new().resolve(&locals, &[]);

        assert_eq!(locals, before);
        assert_eq!(push_ids(&patch), vec!["c", "a", "b"]);
    }
}
