//! Meta state machine
//!
//! Applies schema records and membership changes to the [`SchemaState`]
//! projection. The projection is published through an `RwLock<Arc<_>>`:
//! applying an entry builds the next state off to the side and swaps the
//! pointer, so readers never observe a half-applied entry.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::commands::{MetaCommand, MetaResponse};
use crate::state_machine::{
    decode, encode, ApplyResult, ClusterMember, SchemaState, StateMachineSnapshot,
    StrataStateMachine,
};
use crate::RaftError;

/// State machine for the meta Raft group
pub struct MetaStateMachine {
    state: RwLock<Arc<SchemaState>>,
    last_applied_index: AtomicU64,
    last_applied_term: AtomicU64,
    /// Records that changed state or were accepted as no-ops
    applied_entries: AtomicU64,
    /// Records rejected because a precondition no longer held
    rejected_entries: AtomicU64,
    /// Publishes the last applied index to linearizable readers
    applied_tx: watch::Sender<u64>,
}

impl std::fmt::Debug for MetaStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStateMachine")
            .field("last_applied_index", &self.last_applied_index())
            .field("classes", &self.current().class_count())
            .finish_non_exhaustive()
    }
}

impl Default for MetaStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaStateMachine {
    pub fn new() -> Self {
        let (applied_tx, _) = watch::channel(0);
        Self {
            state: RwLock::new(Arc::new(SchemaState::default())),
            last_applied_index: AtomicU64::new(0),
            last_applied_term: AtomicU64::new(0),
            applied_entries: AtomicU64::new(0),
            rejected_entries: AtomicU64::new(0),
            applied_tx,
        }
    }

    /// Current projection, without any freshness guarantee
    pub fn current(&self) -> Arc<SchemaState> {
        self.state.read().clone()
    }

    /// Wait until entries up to `index` are applied locally.
    ///
    /// Dropping the returned future abandons the wait.
    pub async fn wait_applied(&self, index: u64, timeout: Duration) -> Result<(), RaftError> {
        if self.last_applied_index() >= index {
            return Ok(());
        }
        let mut rx = self.applied_tx.subscribe();
        let result =
            match tokio::time::timeout(timeout, rx.wait_for(|applied| *applied >= index)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(_)) => Err(RaftError::Shutdown),
                Err(_) => Err(RaftError::Timeout(timeout)),
            };
        result
    }

    pub fn applied_entries(&self) -> u64 {
        self.applied_entries.load(Ordering::Relaxed)
    }

    pub fn rejected_entries(&self) -> u64 {
        self.rejected_entries.load(Ordering::Relaxed)
    }

    fn publish(&self, next: SchemaState, index: u64, term: u64) {
        *self.state.write() = Arc::new(next);
        self.advance(index, term);
    }

    fn already_applied(&self, index: u64) -> bool {
        let last = self.last_applied_index();
        if index <= last {
            log::debug!(
                "MetaStateMachine: Skipping already applied entry {} (last_applied={})",
                index,
                last
            );
            return true;
        }
        false
    }
}

impl StrataStateMachine for MetaStateMachine {
    fn name(&self) -> &'static str {
        "MetaStateMachine"
    }

    fn apply(&self, index: u64, term: u64, command: &[u8]) -> Result<ApplyResult, RaftError> {
        if self.already_applied(index) {
            return Ok(ApplyResult::NoOp);
        }

        let cmd: MetaCommand = decode(command)?;
        log::debug!(
            "MetaStateMachine: {} class={} index={}",
            cmd.kind(),
            cmd.class_name(),
            index
        );

        let mut next = SchemaState::clone(&self.current());
        let kind = cmd.kind();
        let response = next.apply_command(index, cmd);
        next.set_applied_index(index);

        match &response {
            MetaResponse::Rejected { kind: reason, message } => {
                log::warn!(
                    "MetaStateMachine: {} rejected at index {} ({}): {}",
                    kind,
                    index,
                    reason,
                    message
                );
                self.rejected_entries.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.applied_entries.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.publish(next, index, term);
        Ok(ApplyResult::Ok(encode(&response)?))
    }

    fn apply_membership(
        &self,
        index: u64,
        term: u64,
        members: Vec<ClusterMember>,
    ) -> Result<(), RaftError> {
        if self.already_applied(index) {
            return Ok(());
        }
        log::info!(
            "MetaStateMachine: Membership at index {}: [{}]",
            index,
            members
                .iter()
                .map(|m| format!("{}{}", m.name, if m.voter { "" } else { "(learner)" }))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut next = SchemaState::clone(&self.current());
        next.set_members(members);
        next.set_applied_index(index);
        self.publish(next, index, term);
        Ok(())
    }

    fn advance(&self, index: u64, term: u64) {
        let previous = self.last_applied_index.fetch_max(index, Ordering::AcqRel);
        if index > previous {
            self.last_applied_term.store(term, Ordering::Release);
            self.applied_tx.send_replace(index);
        }
    }

    fn last_applied_index(&self) -> u64 {
        self.last_applied_index.load(Ordering::Acquire)
    }

    fn last_applied_term(&self) -> u64 {
        self.last_applied_term.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Result<StateMachineSnapshot, RaftError> {
        let state = self.current();
        let data = encode(state.as_ref())?;
        log::debug!(
            "MetaStateMachine: Snapshot at index {} ({} classes, {} bytes)",
            state.applied_index(),
            state.class_count(),
            data.len()
        );
        Ok(StateMachineSnapshot::new(
            self.last_applied_index(),
            self.last_applied_term(),
            data,
        ))
    }

    fn restore(&self, snapshot: StateMachineSnapshot) -> Result<(), RaftError> {
        let state: SchemaState = if snapshot.data.is_empty() {
            SchemaState::default()
        } else {
            decode(&snapshot.data)?
        };
        log::info!(
            "MetaStateMachine: Restored snapshot at index {} ({} classes)",
            snapshot.last_applied_index,
            state.class_count()
        );
        *self.state.write() = Arc::new(state);
        self.last_applied_index
            .store(snapshot.last_applied_index, Ordering::Release);
        self.last_applied_term
            .store(snapshot.last_applied_term, Ordering::Release);
        self.applied_tx.send_replace(snapshot.last_applied_index);
        Ok(())
    }

    fn approximate_size(&self) -> usize {
        let state = self.current();
        state.class_count() + state.shard_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_commons::models::Class;
    use strata_sharding::ShardingState;

    fn add_class(name: &str) -> Vec<u8> {
        encode(&MetaCommand::AddClass {
            class: Class::new(name).with_multi_tenancy(true),
            state: ShardingState::partitioned(name, 1),
        })
        .unwrap()
    }

    fn response(result: ApplyResult) -> MetaResponse {
        decode(&result.into_response()).unwrap()
    }

    #[test]
    fn test_apply_and_skip_replayed_entry() {
        let sm = MetaStateMachine::new();
        let result = sm.apply(1, 1, &add_class("Article")).unwrap();
        assert_eq!(response(result), MetaResponse::Applied { version: 1 });
        assert_eq!(sm.last_applied_index(), 1);

        // same index again: replay, not a duplicate class
        assert_eq!(sm.apply(1, 1, &add_class("Article")).unwrap(), ApplyResult::NoOp);
        assert_eq!(sm.rejected_entries(), 0);
    }

    #[test]
    fn test_reader_snapshot_is_stable() {
        let sm = MetaStateMachine::new();
        sm.apply(1, 1, &add_class("A")).unwrap();
        let before = sm.current();
        sm.apply(2, 1, &add_class("B")).unwrap();

        assert_eq!(before.class_count(), 1);
        assert_eq!(sm.current().class_count(), 2);
    }

    #[test]
    fn test_rejections_are_counted() {
        let sm = MetaStateMachine::new();
        sm.apply(1, 1, &add_class("Dup")).unwrap();
        let result = sm.apply(2, 1, &add_class("Dup")).unwrap();
        assert!(!response(result).is_ok());
        assert_eq!(sm.applied_entries(), 1);
        assert_eq!(sm.rejected_entries(), 1);
        assert_eq!(sm.last_applied_index(), 2);
    }

    #[test]
    fn test_garbage_entry_is_an_error() {
        let sm = MetaStateMachine::new();
        assert!(sm.apply(1, 1, &[0xff, 0xff, 0xff]).is_err());
        assert_eq!(sm.last_applied_index(), 0);
    }

    #[test]
    fn test_snapshot_restore() {
        let sm = MetaStateMachine::new();
        sm.apply(1, 1, &add_class("A")).unwrap();
        sm.apply(2, 2, &add_class("B")).unwrap();
        let snapshot = sm.snapshot().unwrap();

        let restored = MetaStateMachine::new();
        restored.restore(snapshot).unwrap();
        assert_eq!(restored.last_applied_index(), 2);
        assert_eq!(restored.last_applied_term(), 2);
        assert_eq!(*restored.current(), *sm.current());
    }

    #[test]
    fn test_membership_projection() {
        let sm = MetaStateMachine::new();
        let member = ClusterMember {
            name: "node1".into(),
            raft_id: 11,
            rpc_addr: "127.0.0.1:8300".into(),
            api_addr: "127.0.0.1:8080".into(),
            voter: true,
        };
        sm.apply_membership(1, 1, vec![member.clone()]).unwrap();
        assert_eq!(sm.current().member("node1"), Some(&member));
        assert_eq!(sm.current().member_by_raft_id(11).map(|m| m.name.as_str()), Some("node1"));
    }

    #[tokio::test]
    async fn test_wait_applied() {
        let sm = Arc::new(MetaStateMachine::new());
        let waiter = {
            let sm = sm.clone();
            tokio::spawn(async move { sm.wait_applied(2, Duration::from_secs(5)).await })
        };
        sm.advance(1, 1);
        sm.apply(2, 1, &add_class("A")).unwrap();
        assert!(waiter.await.unwrap().is_ok());

        let err = sm.wait_applied(10, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, RaftError::Timeout(_)));
    }
}
