//! Confirmation propagation
//!
//! Confirmation travels from children to parents through a persisted
//! worklist: every key tagged `confirmation-pending` is confirmed on the next
//! cycle, and confirming it re-tags its parents. A crash between cycles loses
//! nothing since the worklist lives in the store.

use crate::core::milestone::Sentinel;
use crate::core::transaction::Relation;
use crate::error::{Result, TangleError};
use crate::storage::{abort, balance_key, tx_key, EntityKey, Store, Tag, TxResult, Txn};
use crate::utils::now_secs;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
    /// Zero-value transaction behind the trim horizon, left alone
    SkippedTrimmed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub scanned: usize,
    pub confirmed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ConfirmationPropagator {
    store: Arc<Store>,
    coordinator_address: Vec<u8>,
    sentinel: Sentinel,
    total_confirmations: AtomicU64,
}

impl ConfirmationPropagator {
    pub fn new(store: Arc<Store>, coordinator_address: Vec<u8>, sentinel: Sentinel) -> Self {
        ConfirmationPropagator {
            store,
            coordinator_address,
            sentinel,
            total_confirmations: AtomicU64::new(0),
        }
    }

    pub fn total_confirmations(&self) -> u64 {
        self.total_confirmations.load(Ordering::Relaxed)
    }

    /// Put a hash on the worklist, or mark it `pending-confirmed` if its
    /// data has not arrived yet. Returns false if it is already confirmed.
    pub fn schedule(&self, hash: &[u8]) -> Result<bool> {
        if self.sentinel.is_hash(hash) {
            return Ok(false);
        }
        let key = tx_key(hash);
        self.store.transaction(|txn| {
            if txn.has(&key.with_tag(Tag::Confirmed))? {
                return Ok(false);
            }
            mark_for_confirmation(txn, &key)?;
            Ok(true)
        })
    }

    /// Confirm one transaction in a single atomic update.
    ///
    /// `key` may carry any tag of the transaction. Integrity and snapshot
    /// horizon failures abort the whole update, so the worklist marker
    /// survives and the transaction is retried on a later cycle.
    pub fn confirm(&self, key: &EntityKey) -> Result<ConfirmOutcome> {
        let key = key.with_tag(Tag::Hash);
        let outcome = self.store.transaction(|txn| self.confirm_in(txn, &key))?;
        if outcome == ConfirmOutcome::Confirmed {
            self.total_confirmations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    fn confirm_in(&self, txn: &Txn<'_>, key: &EntityKey) -> TxResult<ConfirmOutcome> {
        txn.remove(&key.with_tag(Tag::ConfirmationPending))?;

        if txn.has(&key.with_tag(Tag::Confirmed))? {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }

        let timestamp: Option<i64> = txn.get_value(&key.with_tag(Tag::Timestamp))?;
        let value: Option<i64> = txn.get_value(&key.with_tag(Tag::Value))?;
        let address = txn.get(&key.with_tag(Tag::Address))?;
        let relation = txn.get(&key.with_tag(Tag::Relation))?;
        let (timestamp, value, address, relation) = match (timestamp, value, address, relation) {
            (Some(t), Some(v), Some(a), Some(r)) => (t, v, a, r),
            (t, v, a, r) => {
                return abort(TangleError::Integrity(format!(
                    "{key} is missing fields (timestamp: {}, value: {}, address: {}, relation: {})",
                    t.is_some(),
                    v.is_some(),
                    a.is_some(),
                    r.is_some()
                )))
            }
        };
        let relation = match Relation::from_bytes(&relation) {
            Ok(relation) => relation,
            Err(e) => return abort(e),
        };

        if txn.has(&key.with_tag(Tag::TrimPending))? && address != self.coordinator_address {
            if value != 0 {
                return abort(TangleError::SnapshotHorizon { value });
            }
            return Ok(ConfirmOutcome::SkippedTrimmed);
        }

        txn.put_value(&key.with_tag(Tag::Confirmed), &timestamp)?;
        if value != 0 {
            let balance = balance_key(&address);
            txn.incr_by(&balance, value)?;
            if value < 0 {
                txn.put_value(&balance.with_tag(Tag::Spent), &true)?;
            }
        }

        for parent in relation.parents() {
            if self.sentinel.is_key(&parent) {
                continue;
            }
            if txn.has(&parent.with_tag(Tag::Confirmed))? {
                continue;
            }
            mark_for_confirmation(txn, &parent)?;
        }
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Drain the current worklist once
    pub fn run_cycle(&self) -> Result<CycleReport> {
        self.store.wait_idle();
        let keys = self.store.keys_with_tag(Tag::ConfirmationPending)?;
        let mut report = CycleReport {
            scanned: keys.len(),
            ..CycleReport::default()
        };
        for key in keys {
            match self.confirm(&key) {
                Ok(ConfirmOutcome::Confirmed) => report.confirmed += 1,
                Ok(ConfirmOutcome::AlreadyConfirmed) => {}
                Ok(ConfirmOutcome::SkippedTrimmed) => report.skipped += 1,
                Err(e @ TangleError::SnapshotHorizon { .. }) => {
                    error!("Deferring confirmation of {key}: {e}");
                    report.failed += 1;
                }
                Err(e) if e.is_integrity() => {
                    error!("Possible database inconsistency confirming {key}: {e}");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Failed to confirm {key}: {e}");
                    report.failed += 1;
                }
            }
        }
        if report.confirmed > 0 {
            debug!(
                "Confirmation cycle: {} confirmed, {} skipped, {} failed of {}",
                report.confirmed, report.skipped, report.failed, report.scanned
            );
        }
        Ok(report)
    }

    /// Run cycles until the worklist is empty or only failing keys remain
    pub fn run_until_idle(&self, max_cycles: usize) -> Result<usize> {
        let mut confirmed = 0;
        for _ in 0..max_cycles {
            let report = self.run_cycle()?;
            confirmed += report.confirmed;
            if report.confirmed == 0 {
                break;
            }
        }
        info!("Confirmation drained: {confirmed} transactions confirmed");
        Ok(confirmed)
    }
}

// Present data goes on the worklist; missing data waits for arrival unless
// it is known to have been pruned.
fn mark_for_confirmation(txn: &Txn<'_>, key: &EntityKey) -> TxResult<()> {
    match txn.get(&key.with_tag(Tag::Timestamp))? {
        Some(timestamp) => txn.put_raw(&key.with_tag(Tag::ConfirmationPending), &timestamp),
        None => {
            if !txn.has(&key.with_tag(Tag::Edge))? {
                txn.put_value(&key.with_tag(Tag::PendingConfirmed), &now_secs())?;
            }
            Ok(())
        }
    }
}
