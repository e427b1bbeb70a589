//! Combined Raft Storage Implementation
//!
//! Implements the combined `RaftStorage` trait (v1 API) which includes:
//! - Log storage (RaftLogReader)
//! - State machine operations
//! - Snapshot building
//!
//! The log lives in memory. A restarted node rejoins empty and is brought up
//! to date by the leader through log replication or snapshot install.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::io::Cursor;
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use openraft::storage::{LogState, RaftLogReader, RaftStorage, Snapshot};
use openraft::{
    Entry, EntryPayload, LogId, Membership, OptionalSend, RaftSnapshotBuilder, SnapshotMeta,
    StorageError, StorageIOError, StoredMembership, Vote,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::state_machine::{decode, encode, ClusterMember, StateMachineSnapshot, StrataStateMachine};
use crate::storage::types::{StrataNode, StrataTypeConfig};

/// Stored snapshot data
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub meta: SnapshotMeta<u64, StrataNode>,
    pub data: Vec<u8>,
}

/// Log entry stored in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntryData {
    log_id: LogId<u64>,
    payload: Vec<u8>,
}

/// State machine data that gets serialized to snapshots
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StateMachineData {
    last_applied_log: Option<LogId<u64>>,
    last_membership: StoredMembership<u64, StrataNode>,
    /// Serialized state machine projection
    state: Vec<u8>,
}

/// Combined Raft storage implementing both log and state machine storage
pub struct StrataRaftStorage<SM: StrataStateMachine> {
    /// In-memory log entries (index -> entry)
    log: RwLock<BTreeMap<u64, LogEntryData>>,

    /// Current vote
    vote: RwLock<Option<Vote<u64>>>,

    /// Committed log id
    committed: RwLock<Option<LogId<u64>>>,

    /// Last purged log ID
    last_purged: RwLock<Option<LogId<u64>>>,

    /// The inner state machine
    state_machine: Arc<SM>,

    /// Last applied log id
    last_applied: RwLock<Option<LogId<u64>>>,

    /// Last membership
    last_membership: RwLock<StoredMembership<u64, StrataNode>>,

    /// Snapshot counter
    snapshot_idx: AtomicU64,

    /// Current snapshot
    current_snapshot: RwLock<Option<StoredSnapshot>>,

    /// Held while applying entries and while capturing a snapshot, so a
    /// snapshot never pairs a log position with a different projection
    apply_guard: Mutex<()>,
}

impl<SM: StrataStateMachine> Debug for StrataRaftStorage<SM> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrataRaftStorage")
            .field("state_machine", &self.state_machine.name())
            .field("snapshot_idx", &self.snapshot_idx)
            .finish_non_exhaustive()
    }
}

impl<SM: StrataStateMachine> StrataRaftStorage<SM> {
    /// Create a new combined Raft storage
    pub fn new(state_machine: Arc<SM>) -> Self {
        Self {
            log: RwLock::new(BTreeMap::new()),
            vote: RwLock::new(None),
            committed: RwLock::new(None),
            last_purged: RwLock::new(None),
            state_machine,
            last_applied: RwLock::new(None),
            last_membership: RwLock::new(StoredMembership::default()),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: RwLock::new(None),
            apply_guard: Mutex::new(()),
        }
    }

    /// Get reference to the state machine
    pub fn state_machine(&self) -> &Arc<SM> {
        &self.state_machine
    }

    /// Number of entries currently held in the log
    pub fn log_len(&self) -> usize {
        self.log.read().len()
    }

    /// Get log entries in a range (sync helper)
    fn get_log_entries_sync(
        &self,
        range: impl RangeBounds<u64>,
    ) -> Result<Vec<Entry<StrataTypeConfig>>, StorageError<u64>> {
        let log = self.log.read();
        log.range(range)
            .map(|(_, entry)| {
                let payload = decode::<EntryPayload<StrataTypeConfig>>(&entry.payload).map_err(|e| {
                    log::error!("Failed to decode log entry {}: {}", entry.log_id, e);
                    StorageIOError::read_log_at_index(entry.log_id.index, &e)
                })?;
                Ok(Entry {
                    log_id: entry.log_id,
                    payload,
                })
            })
            .collect()
    }
}

/// Project an openraft membership onto cluster members
fn members_of(membership: &Membership<u64, StrataNode>) -> Vec<ClusterMember> {
    let voters: BTreeSet<u64> = membership.voter_ids().collect();
    membership
        .nodes()
        .map(|(id, node)| ClusterMember {
            name: node.name.clone(),
            raft_id: *id,
            rpc_addr: node.rpc_addr.clone(),
            api_addr: node.api_addr.clone(),
            voter: voters.contains(id),
        })
        .collect()
}

/// Log reader implementation that shares access to the storage
pub struct StrataLogReader<SM: StrataStateMachine> {
    storage: Arc<StrataRaftStorage<SM>>,
}

impl<SM: StrataStateMachine> Clone for StrataLogReader<SM> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<SM: StrataStateMachine> RaftLogReader<StrataTypeConfig> for StrataLogReader<SM> {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<StrataTypeConfig>>, StorageError<u64>> {
        self.storage.get_log_entries_sync(range)
    }
}

/// Snapshot builder serializing the full state machine projection
pub struct StrataSnapshotBuilder<SM: StrataStateMachine> {
    storage: Arc<StrataRaftStorage<SM>>,
}

impl<SM: StrataStateMachine> RaftSnapshotBuilder<StrataTypeConfig> for StrataSnapshotBuilder<SM> {
    async fn build_snapshot(&mut self) -> Result<Snapshot<StrataTypeConfig>, StorageError<u64>> {
        let (last_applied, last_membership, sm_snapshot) = {
            let _guard = self.storage.apply_guard.lock();
            let last_applied = *self.storage.last_applied.read();
            let last_membership = self.storage.last_membership.read().clone();
            let sm_snapshot = self
                .storage
                .state_machine
                .snapshot()
                .map_err(|e| StorageIOError::read_state_machine(&e))?;
            (last_applied, last_membership, sm_snapshot)
        };

        let data = StateMachineData {
            last_applied_log: last_applied,
            last_membership: last_membership.clone(),
            state: sm_snapshot.data,
        };

        let serialized = encode(&data).map_err(|e| StorageIOError::read_state_machine(&e))?;

        let snapshot_idx = self.storage.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = if let Some(last) = last_applied {
            format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx)
        } else {
            format!("--{}", snapshot_idx)
        };

        let meta = SnapshotMeta {
            last_log_id: last_applied,
            last_membership,
            snapshot_id,
        };

        log::debug!(
            "Built snapshot {} ({} bytes)",
            meta.snapshot_id,
            serialized.len()
        );

        {
            let mut current = self.storage.current_snapshot.write();
            *current = Some(StoredSnapshot {
                meta: meta.clone(),
                data: serialized.clone(),
            });
        }

        Ok(Snapshot {
            meta,
            snapshot: Box::new(Cursor::new(serialized)),
        })
    }
}

// Implement the combined RaftStorage trait
#[allow(deprecated)] // RaftStorage is deprecated in favor of v2 traits, but v2 is sealed
impl<SM: StrataStateMachine> RaftStorage<StrataTypeConfig> for Arc<StrataRaftStorage<SM>> {
    type LogReader = StrataLogReader<SM>;
    type SnapshotBuilder = StrataSnapshotBuilder<SM>;

    // --- Vote operations ---

    async fn save_vote(&mut self, vote: &Vote<u64>) -> Result<(), StorageError<u64>> {
        let mut current = self.vote.write();
        *current = Some(vote.clone());
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<u64>>, StorageError<u64>> {
        Ok(self.vote.read().clone())
    }

    async fn save_committed(
        &mut self,
        committed: Option<LogId<u64>>,
    ) -> Result<(), StorageError<u64>> {
        let mut c = self.committed.write();
        *c = committed;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<LogId<u64>>, StorageError<u64>> {
        Ok(*self.committed.read())
    }

    // --- Log operations ---

    async fn get_log_state(&mut self) -> Result<LogState<StrataTypeConfig>, StorageError<u64>> {
        let log = self.log.read();
        let last_purged = *self.last_purged.read();
        let last_log_id = log.iter().next_back().map(|(_, e)| e.log_id).or(last_purged);

        Ok(LogState {
            last_purged_log_id: last_purged,
            last_log_id,
        })
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        StrataLogReader {
            storage: self.clone(),
        }
    }

    async fn append_to_log<I>(&mut self, entries: I) -> Result<(), StorageError<u64>>
    where
        I: IntoIterator<Item = Entry<StrataTypeConfig>> + OptionalSend,
    {
        let mut log = self.log.write();

        for entry in entries {
            let payload = encode(&entry.payload).map_err(|e| StorageIOError::write_logs(&e))?;

            log.insert(
                entry.log_id.index,
                LogEntryData {
                    log_id: entry.log_id,
                    payload,
                },
            );
        }

        Ok(())
    }

    async fn delete_conflict_logs_since(
        &mut self,
        log_id: LogId<u64>,
    ) -> Result<(), StorageError<u64>> {
        let mut log = self.log.write();
        log.split_off(&log_id.index);
        Ok(())
    }

    async fn purge_logs_upto(&mut self, log_id: LogId<u64>) -> Result<(), StorageError<u64>> {
        let mut log = self.log.write();
        let mut last_purged = self.last_purged.write();

        *log = log.split_off(&(log_id.index + 1));
        *last_purged = Some(log_id);
        Ok(())
    }

    // --- State Machine operations ---

    async fn last_applied_state(
        &mut self,
    ) -> Result<(Option<LogId<u64>>, StoredMembership<u64, StrataNode>), StorageError<u64>> {
        let last_applied = *self.last_applied.read();
        let last_membership = self.last_membership.read().clone();
        Ok((last_applied, last_membership))
    }

    async fn apply_to_state_machine(
        &mut self,
        entries: &[Entry<StrataTypeConfig>],
    ) -> Result<Vec<Vec<u8>>, StorageError<u64>> {
        let mut results = Vec::with_capacity(entries.len());
        let _guard = self.apply_guard.lock();

        for entry in entries {
            let log_id = entry.log_id;
            let index = log_id.index;
            let term = log_id.leader_id.term;

            match &entry.payload {
                EntryPayload::Blank => {
                    self.state_machine.advance(index, term);
                    results.push(Vec::new());
                }
                EntryPayload::Normal(data) => {
                    // A record that cannot be applied means this node's
                    // state can no longer be trusted: stop the Raft instance.
                    let result = self.state_machine.apply(index, term, data).map_err(|e| {
                        log::error!(
                            "{}: fatal apply failure at index {}: {}",
                            self.state_machine.name(),
                            index,
                            e
                        );
                        StorageIOError::apply(log_id, &e)
                    })?;
                    results.push(result.into_response());
                }
                EntryPayload::Membership(mem) => {
                    self.state_machine
                        .apply_membership(index, term, members_of(mem))
                        .map_err(|e| StorageIOError::apply(log_id, &e))?;
                    let mut membership = self.last_membership.write();
                    *membership = StoredMembership::new(Some(log_id), mem.clone());
                    results.push(Vec::new());
                }
            }

            *self.last_applied.write() = Some(log_id);
        }

        Ok(results)
    }

    // --- Snapshot operations ---

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        StrataSnapshotBuilder {
            storage: self.clone(),
        }
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<Cursor<Vec<u8>>>, StorageError<u64>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<u64, StrataNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<u64>> {
        let data = snapshot.into_inner();

        let sm_data: StateMachineData = decode(&data)
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;

        let (index, term) = meta
            .last_log_id
            .map(|id| (id.index, id.leader_id.term))
            .unwrap_or((0, 0));
        self.state_machine
            .restore(StateMachineSnapshot::new(index, term, sm_data.state))
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;

        {
            let mut last = self.last_applied.write();
            *last = meta.last_log_id;
        }
        {
            let mut membership = self.last_membership.write();
            *membership = meta.last_membership.clone();
        }

        {
            let mut current = self.current_snapshot.write();
            *current = Some(StoredSnapshot {
                meta: meta.clone(),
                data,
            });
        }

        // Clear logs up to the snapshot point
        if let Some(last_log_id) = meta.last_log_id {
            let mut log = self.log.write();
            let mut last_purged = self.last_purged.write();
            *log = log.split_off(&(last_log_id.index + 1));
            *last_purged = Some(last_log_id);
        }

        log::info!("Installed snapshot {} at index {}", meta.snapshot_id, index);
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<Snapshot<StrataTypeConfig>>, StorageError<u64>> {
        let current = self.current_snapshot.read();
        match current.as_ref() {
            Some(snapshot) => Ok(Some(Snapshot {
                meta: snapshot.meta.clone(),
                snapshot: Box::new(Cursor::new(snapshot.data.clone())),
            })),
            None => Ok(None),
        }
    }
}

impl<SM: StrataStateMachine> RaftLogReader<StrataTypeConfig> for Arc<StrataRaftStorage<SM>> {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<StrataTypeConfig>>, StorageError<u64>> {
        self.get_log_entries_sync(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{MetaCommand, MetaResponse};
    use crate::state_machine::MetaStateMachine;
    use openraft::CommittedLeaderId;
    use strata_commons::models::Class;
    use strata_sharding::ShardingState;

    fn log_id(term: u64, index: u64) -> LogId<u64> {
        LogId::new(CommittedLeaderId::new(term, 1), index)
    }

    fn normal(index: u64, name: &str) -> Entry<StrataTypeConfig> {
        let cmd = MetaCommand::AddClass {
            class: Class::new(name).with_multi_tenancy(true),
            state: ShardingState::partitioned(name, 1),
        };
        Entry {
            log_id: log_id(1, index),
            payload: EntryPayload::Normal(encode(&cmd).unwrap()),
        }
    }

    fn new_storage() -> Arc<StrataRaftStorage<MetaStateMachine>> {
        Arc::new(StrataRaftStorage::new(Arc::new(MetaStateMachine::new())))
    }

    #[tokio::test]
    async fn test_storage_creation() {
        let mut storage = new_storage();
        let (last_applied, _) = storage.last_applied_state().await.unwrap();
        assert!(last_applied.is_none());
    }

    #[tokio::test]
    async fn test_vote_operations() {
        let mut storage = new_storage();
        assert!(storage.read_vote().await.unwrap().is_none());

        let vote = Vote::new(1, 1);
        storage.save_vote(&vote).await.unwrap();
        assert_eq!(storage.read_vote().await.unwrap(), Some(vote));
    }

    #[tokio::test]
    async fn test_log_append_truncate_purge() {
        let mut storage = new_storage();
        let entries: Vec<_> = (1..=5).map(|i| normal(i, &format!("C{}", i))).collect();
        storage.append_to_log(entries).await.unwrap();
        assert_eq!(storage.log_len(), 5);

        storage.delete_conflict_logs_since(log_id(1, 4)).await.unwrap();
        assert_eq!(storage.log_len(), 3);

        storage.purge_logs_upto(log_id(1, 2)).await.unwrap();
        let state = storage.get_log_state().await.unwrap();
        assert_eq!(state.last_purged_log_id, Some(log_id(1, 2)));
        assert_eq!(state.last_log_id, Some(log_id(1, 3)));

        let read = storage.try_get_log_entries(0..10).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].log_id.index, 3);
    }

    #[tokio::test]
    async fn test_apply_normal_blank_and_membership() {
        let mut storage = new_storage();

        let mut nodes = BTreeMap::new();
        nodes.insert(7u64, StrataNode::new("node1", "127.0.0.1:8300", "127.0.0.1:8080"));
        let membership: Membership<u64, StrataNode> = nodes.into();

        let entries = vec![
            Entry {
                log_id: log_id(1, 1),
                payload: EntryPayload::Blank,
            },
            Entry {
                log_id: log_id(1, 2),
                payload: EntryPayload::Membership(membership),
            },
            normal(3, "Article"),
        ];
        let results = storage.apply_to_state_machine(&entries).await.unwrap();
        assert_eq!(results.len(), 3);
        let response: MetaResponse = decode(&results[2]).unwrap();
        assert_eq!(response, MetaResponse::Applied { version: 3 });

        let sm = storage.state_machine().clone();
        assert_eq!(sm.last_applied_index(), 3);
        let state = sm.current();
        assert!(state.class("Article").is_some());
        let member = state.member("node1").unwrap();
        assert_eq!(member.raft_id, 7);
        assert!(member.voter);

        let (last_applied, last_membership) = storage.last_applied_state().await.unwrap();
        assert_eq!(last_applied, Some(log_id(1, 3)));
        assert_eq!(last_membership.log_id(), &Some(log_id(1, 2)));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_fatal() {
        let mut storage = new_storage();
        let entry = Entry {
            log_id: log_id(1, 1),
            payload: EntryPayload::Normal(vec![0xff, 0xff]),
        };
        assert!(storage.apply_to_state_machine(&[entry]).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_build_and_install() {
        let mut source = new_storage();
        source
            .apply_to_state_machine(&[normal(1, "A"), normal(2, "B")])
            .await
            .unwrap();
        let mut builder = source.get_snapshot_builder().await;
        let snapshot = builder.build_snapshot().await.unwrap();
        assert_eq!(snapshot.meta.last_log_id, Some(log_id(1, 2)));

        let mut target = new_storage();
        target
            .install_snapshot(&snapshot.meta, snapshot.snapshot)
            .await
            .unwrap();

        let sm = target.state_machine().clone();
        assert_eq!(sm.last_applied_index(), 2);
        assert_eq!(sm.current().class_count(), 2);
        assert!(target.get_current_snapshot().await.unwrap().is_some());
    }
}
