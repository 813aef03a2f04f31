//! Redemption workflow: converting balance into a staff-fulfilled reward.
//!
//! State machine: `pending -> approved -> completed`, `pending -> denied`.
//! The charge is debited exactly once, when the request is created. Staff
//! resolution is a conditional transition: it only succeeds if the stored
//! status is still `pending` at the moment of the write, so two racing
//! approve/deny clicks can never both take effect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::{Ledger, TxnKind, UserId};
use crate::storage::RecordStore;

const REDEEM_PREFIX: &[u8] = b"redeem:request:";
const REDEEM_SEQ_KEY: &[u8] = b"redeem:seq";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RedeemStatus {
    Pending,
    Approved,
    Denied,
    Completed,
}

impl fmt::Display for RedeemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeemStatus::Pending => write!(f, "pending"),
            RedeemStatus::Approved => write!(f, "approved"),
            RedeemStatus::Denied => write!(f, "denied"),
            RedeemStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Staff decision on a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedeemDecision {
    Approve,
    Deny,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub id: u64,
    pub user_id: UserId,
    /// Debited from the account when the request was created.
    pub charged_amount: u64,
    pub reward_id: Option<u64>,
    pub status: RedeemStatus,
    /// Requester's note, then the staff decision note once resolved.
    pub note: String,
    /// Opaque reference returned by the ticket-provisioning collaborator.
    pub ticket_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn redeem_key(id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(REDEEM_PREFIX.len() + 8);
    key.extend_from_slice(REDEEM_PREFIX);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Best-effort delivery of a short text message to a user. Failures are
/// logged and never roll back a state transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: UserId, message: &str) -> LedgerResult<()>;
}

/// Notifier that only logs; useful as a default and in tests.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user: UserId, message: &str) -> LedgerResult<()> {
        tracing::info!(user = %user, message, "notification");
        Ok(())
    }
}

/// External ticket-provisioning collaborator, invoked on approval. Returns
/// an opaque reference stored on the request.
#[async_trait]
pub trait TicketProvisioner: Send + Sync {
    async fn open_ticket(&self, request: &RedeemRequest) -> LedgerResult<String>;
}

/// Provisioner for deployments where staff open tickets by hand; the stored
/// reference just names the request.
pub struct ManualTicketing;

#[async_trait]
impl TicketProvisioner for ManualTicketing {
    async fn open_ticket(&self, request: &RedeemRequest) -> LedgerResult<String> {
        Ok(format!("manual:{}", request.id))
    }
}

/// Durable request store with conditional-update semantics.
struct RedeemStore {
    store: RecordStore,
    seq: AtomicU64,
    /// Serializes every status write so a compare-and-set cannot interleave
    /// with another writer between its read and its write.
    lock: Mutex<()>,
}

impl RedeemStore {
    fn open(store: RecordStore) -> LedgerResult<Self> {
        let next_seq = match store.get(REDEEM_SEQ_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LedgerError::Storage("corrupt redeem sequence cursor".to_string())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        Ok(Self {
            store,
            seq: AtomicU64::new(next_seq),
            lock: Mutex::new(()),
        })
    }

    fn load(&self, id: u64) -> LedgerResult<RedeemRequest> {
        match self.store.get(&redeem_key(id))? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                LedgerError::Storage(format!("failed to decode redeem request {}: {}", id, e))
            }),
            None => Err(LedgerError::RequestNotFound(id)),
        }
    }

    fn write(&self, request: &RedeemRequest) -> LedgerResult<()> {
        self.store
            .put(&redeem_key(request.id), &serde_json::to_vec(request)?)
    }

    fn insert(&self, mut request: RedeemRequest) -> LedgerResult<RedeemRequest> {
        let _lock = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        request.id = self.seq.fetch_add(1, Ordering::SeqCst);
        self.store.batch_write(&[
            (redeem_key(request.id), serde_json::to_vec(&request)?),
            (
                REDEEM_SEQ_KEY.to_vec(),
                self.seq.load(Ordering::SeqCst).to_be_bytes().to_vec(),
            ),
        ])?;
        Ok(request)
    }

    /// Single conditional write: apply `mutate` and persist only if the
    /// stored status equals `expect`; otherwise report `AlreadyProcessed`
    /// with no side effects.
    fn update_if_status(
        &self,
        id: u64,
        expect: RedeemStatus,
        mutate: impl FnOnce(&mut RedeemRequest),
    ) -> LedgerResult<RedeemRequest> {
        let _lock = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut request = self.load(id)?;
        if request.status != expect {
            return Err(LedgerError::AlreadyProcessed(id));
        }
        mutate(&mut request);
        self.write(&request)?;
        Ok(request)
    }

    /// Unconditional field update (used to attach the ticket reference
    /// after the fencing transition already happened).
    fn update(
        &self,
        id: u64,
        mutate: impl FnOnce(&mut RedeemRequest),
    ) -> LedgerResult<RedeemRequest> {
        let _lock = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut request = self.load(id)?;
        mutate(&mut request);
        self.write(&request)?;
        Ok(request)
    }

    fn list_pending(&self, limit: usize) -> LedgerResult<Vec<RedeemRequest>> {
        let rows = self.store.scan_prefix(REDEEM_PREFIX, usize::MAX)?;
        let mut pending = Vec::new();
        for (key, value) in rows {
            let request: RedeemRequest = serde_json::from_slice(&value).map_err(|e| {
                LedgerError::Storage(format!("failed to decode redeem request at {:?}: {}", key, e))
            })?;
            if request.status == RedeemStatus::Pending {
                pending.push(request);
                if pending.len() >= limit {
                    break;
                }
            }
        }
        Ok(pending)
    }
}

/// The redemption workflow: charge-on-create, conditional staff resolution,
/// ticket provisioning on approval.
pub struct RedeemWorkflow {
    ledger: Arc<Ledger>,
    store: RedeemStore,
    notifier: Arc<dyn Notifier>,
    ticketing: Arc<dyn TicketProvisioner>,
    refund_on_deny: bool,
}

impl RedeemWorkflow {
    pub fn open(
        store: RecordStore,
        ledger: Arc<Ledger>,
        notifier: Arc<dyn Notifier>,
        ticketing: Arc<dyn TicketProvisioner>,
        refund_on_deny: bool,
    ) -> LedgerResult<Self> {
        Ok(Self {
            ledger,
            store: RedeemStore::open(store)?,
            notifier,
            ticketing,
            refund_on_deny,
        })
    }

    async fn notify_best_effort(&self, user: UserId, message: String) {
        if let Err(e) = self.notifier.notify(user, &message).await {
            tracing::warn!(user = %user, error = %e, "notification failed");
        }
    }

    /// Create a pending request, debiting `amount` atomically. Fails with
    /// `InsufficientFunds` before anything is written if the balance is
    /// short.
    pub async fn create(
        &self,
        user: UserId,
        amount: u64,
        reward_id: Option<u64>,
        note: impl Into<String>,
    ) -> LedgerResult<RedeemRequest> {
        if amount == 0 {
            return Err(LedgerError::InvalidSelection(
                "redeem amount must be positive".to_string(),
            ));
        }
        let note = note.into();
        // Charge-on-request: the debit happens here, never on approval.
        self.ledger.apply_delta(
            user,
            -(amount as i64),
            TxnKind::RedeemRequest,
            format!("reason:{}", note),
        )?;
        let request = self.store.insert(RedeemRequest {
            id: 0,
            user_id: user,
            charged_amount: amount,
            reward_id,
            status: RedeemStatus::Pending,
            note,
            ticket_ref: None,
            created_at: Utc::now(),
        })?;
        tracing::info!(request = request.id, user = %user, amount, "redeem request created");
        self.notify_best_effort(
            user,
            format!(
                "Redeem request #{} for {} CYAN submitted. Staff will review.",
                request.id, amount
            ),
        )
        .await;
        Ok(request)
    }

    /// Staff resolution. Exactly one of two concurrent calls on the same
    /// pending request succeeds; the loser gets `AlreadyProcessed`.
    pub async fn resolve(
        &self,
        id: u64,
        decision: RedeemDecision,
        note: impl Into<String>,
    ) -> LedgerResult<RedeemRequest> {
        let note = note.into();
        let new_status = match decision {
            RedeemDecision::Approve => RedeemStatus::Approved,
            RedeemDecision::Deny => RedeemStatus::Denied,
        };
        // The fencing transition: conditional on the status still being
        // pending. Side effects only run after it succeeds.
        let mut request = self.store.update_if_status(id, RedeemStatus::Pending, |r| {
            r.status = new_status;
            r.note = note.clone();
        })?;
        tracing::info!(request = id, status = %new_status, "redeem request resolved");

        match decision {
            RedeemDecision::Approve => match self.ticketing.open_ticket(&request).await {
                Ok(ticket_ref) => {
                    request = self.store.update(id, |r| {
                        r.ticket_ref = Some(ticket_ref.clone());
                    })?;
                }
                Err(e) => {
                    tracing::warn!(request = id, error = %e, "ticket provisioning failed");
                }
            },
            RedeemDecision::Deny => {
                if self.refund_on_deny {
                    self.ledger.apply_delta(
                        request.user_id,
                        request.charged_amount as i64,
                        TxnKind::RedeemRefund,
                        format!("request {} denied", id),
                    )?;
                }
            }
        }

        self.notify_best_effort(
            request.user_id,
            format!(
                "Your redeem request #{} for {} CYAN was {}. Note: {}",
                id,
                request.charged_amount,
                new_status.to_string().to_uppercase(),
                request.note
            ),
        )
        .await;
        Ok(request)
    }

    /// Retry ticket provisioning for an approved request that has none,
    /// so a transient provisioning failure never strands a request. A
    /// request that already carries a ticket is returned unchanged.
    pub async fn reprovision_ticket(&self, id: u64) -> LedgerResult<RedeemRequest> {
        let request = self.store.load(id)?;
        if request.status != RedeemStatus::Approved {
            return Err(LedgerError::InvalidSelection(format!(
                "request {} is {}, only approved requests carry tickets",
                id, request.status
            )));
        }
        if request.ticket_ref.is_some() {
            return Ok(request);
        }
        let ticket_ref = self.ticketing.open_ticket(&request).await?;
        // A concurrent retry may have landed first; keep the earlier ref.
        let updated = self.store.update(id, |r| {
            if r.ticket_ref.is_none() {
                r.ticket_ref = Some(ticket_ref.clone());
            }
        })?;
        tracing::info!(request = id, "ticket provisioned on retry");
        Ok(updated)
    }

    /// Terminal transition once the ticket is closed. No monetary effect.
    pub async fn complete(&self, id: u64) -> LedgerResult<RedeemRequest> {
        let request = self.store.update_if_status(id, RedeemStatus::Approved, |r| {
            r.status = RedeemStatus::Completed;
        })?;
        tracing::info!(request = id, "redeem request completed");
        self.notify_best_effort(
            request.user_id,
            format!("Your redeem request #{} is complete.", id),
        )
        .await;
        Ok(request)
    }

    pub fn get(&self, id: u64) -> LedgerResult<RedeemRequest> {
        self.store.load(id)
    }

    pub fn pending(&self, limit: usize) -> LedgerResult<Vec<RedeemRequest>> {
        self.store.list_pending(limit)
    }
}
