//! SIP registry service
//!
//! Validates and mutates trunks, dispatch rules and participants, assigns ids
//! and enforces the rule → trunk references. Holds nothing but handles to its
//! collaborators, so it is cheap to clone and safe to call concurrently.
//!
//! The rule → trunk check at creation is a read, not a transaction: a trunk
//! deleted between the check and the insert leaves a stale reference. The
//! dispatch matcher treats such references as inapplicable.

use crate::domain::dispatch::{DispatchDecision, DispatchMatcher, InboundCall};
use crate::domain::dispatch_rule::{CreateSipDispatchRule, SipDispatchRule};
use crate::domain::participant::{
    CallControl, CreateSipParticipant, DtmfDigits, DtmfResult, SipParticipant,
};
use crate::domain::shared::id::{
    SIP_CALL_PREFIX, SIP_DISPATCH_RULE_PREFIX, SIP_PARTICIPANT_PREFIX, SIP_TRUNK_PREFIX,
};
use crate::domain::shared::{DomainError, IdAllocator, RandomIdAllocator, Result};
use crate::domain::sip_trunk::{CreateSipTrunk, SipTrunk};
use crate::domain::store::{Entity, EntityStore, Repository};
use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on a single registry operation
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SipService {
    store: Option<Arc<dyn EntityStore>>,
    ids: Arc<dyn IdAllocator>,
    call_control: Option<Arc<dyn CallControl>>,
    request_timeout: Duration,
}

impl SipService {
    /// Create the service. Without a store every operation fails with
    /// `NotReady`.
    pub fn new(store: Option<Arc<dyn EntityStore>>) -> Self {
        Self {
            store,
            ids: Arc::new(RandomIdAllocator::new()),
            call_control: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_id_allocator(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_call_control(mut self, call_control: Arc<dyn CallControl>) -> Self {
        self.call_control = Some(call_control);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether a store was configured
    pub fn is_ready(&self) -> bool {
        self.store.is_some()
    }

    /// Check that the store answers
    pub async fn ping(&self) -> Result<()> {
        self.bounded("ping", async { self.store()?.ping().await })
            .await
    }

    // ---- Trunks ----

    pub async fn create_sip_trunk(&self, req: CreateSipTrunk) -> Result<SipTrunk> {
        self.bounded("create_sip_trunk", async {
            let trunks = self.repository::<SipTrunk>()?;
            req.validate()?;

            let trunk = SipTrunk::new(self.ids.allocate(SIP_TRUNK_PREFIX), req);
            trunks.insert(&trunk).await?;

            info!(
                "Created SIP trunk {} ({} inbound addresses)",
                trunk.sip_trunk_id,
                trunk.inbound_addresses.len()
            );
            Ok(trunk)
        })
        .await
    }

    pub async fn list_sip_trunk(&self) -> Result<Vec<SipTrunk>> {
        self.bounded("list_sip_trunk", async {
            let trunks = self.repository::<SipTrunk>()?.list().await?;
            debug!("Listed {} SIP trunks", trunks.len());
            Ok(trunks)
        })
        .await
    }

    /// Delete a trunk. Refused while any dispatch rule lists it.
    pub async fn delete_sip_trunk(&self, sip_trunk_id: &str) -> Result<SipTrunk> {
        self.bounded("delete_sip_trunk", async {
            let rules = self.repository::<SipDispatchRule>()?.list().await?;

            let trunk = self
                .delete_entity::<SipTrunk>(sip_trunk_id, |trunk| {
                    let referencing: Vec<&str> = rules
                        .iter()
                        .filter(|r| r.references(&trunk.sip_trunk_id))
                        .map(|r| r.sip_dispatch_rule_id.as_str())
                        .collect();

                    if referencing.is_empty() {
                        Ok(())
                    } else {
                        Err(DomainError::FailedPrecondition(format!(
                            "trunk {} is referenced by dispatch rules {}",
                            trunk.sip_trunk_id,
                            referencing.join(", ")
                        )))
                    }
                })
                .await?;

            info!("Deleted SIP trunk {}", trunk.sip_trunk_id);
            Ok(trunk)
        })
        .await
    }

    // ---- Dispatch rules ----

    pub async fn create_sip_dispatch_rule(
        &self,
        req: CreateSipDispatchRule,
    ) -> Result<SipDispatchRule> {
        self.bounded("create_sip_dispatch_rule", async {
            let rules = self.repository::<SipDispatchRule>()?;
            let trunks = self.repository::<SipTrunk>()?;
            req.validate()?;

            let rule = SipDispatchRule::new(self.ids.allocate(SIP_DISPATCH_RULE_PREFIX), req);

            let mut missing = Vec::new();
            for trunk_id in &rule.trunk_ids {
                if trunks.find(trunk_id).await?.is_none() {
                    missing.push(trunk_id.as_str());
                }
            }
            if !missing.is_empty() {
                return Err(DomainError::InvalidArgument(format!(
                    "unknown trunk ids: {}",
                    missing.join(", ")
                )));
            }

            rules.insert(&rule).await?;

            info!(
                "Created SIP dispatch rule {} for {}",
                rule.sip_dispatch_rule_id,
                if rule.is_wildcard() {
                    "all trunks".to_string()
                } else {
                    rule.trunk_ids.join(", ")
                }
            );
            Ok(rule)
        })
        .await
    }

    pub async fn list_sip_dispatch_rule(&self) -> Result<Vec<SipDispatchRule>> {
        self.bounded("list_sip_dispatch_rule", async {
            let rules = self.repository::<SipDispatchRule>()?.list().await?;
            debug!("Listed {} SIP dispatch rules", rules.len());
            Ok(rules)
        })
        .await
    }

    pub async fn delete_sip_dispatch_rule(
        &self,
        sip_dispatch_rule_id: &str,
    ) -> Result<SipDispatchRule> {
        self.bounded("delete_sip_dispatch_rule", async {
            let rule = self
                .delete_entity::<SipDispatchRule>(sip_dispatch_rule_id, |_| Ok(()))
                .await?;
            info!("Deleted SIP dispatch rule {}", rule.sip_dispatch_rule_id);
            Ok(rule)
        })
        .await
    }

    // ---- Participants ----

    pub async fn create_sip_participant(
        &self,
        req: CreateSipParticipant,
    ) -> Result<SipParticipant> {
        self.bounded("create_sip_participant", async {
            let participants = self.repository::<SipParticipant>()?;
            let trunks = self.repository::<SipTrunk>()?;
            req.validate()?;

            if trunks.find(&req.sip_trunk_id).await?.is_none() {
                return Err(DomainError::InvalidArgument(format!(
                    "unknown trunk id: {}",
                    req.sip_trunk_id
                )));
            }

            let participant = SipParticipant::new(
                self.ids.allocate(SIP_PARTICIPANT_PREFIX),
                self.ids.allocate(SIP_CALL_PREFIX),
                req,
            );
            participants.insert(&participant).await?;

            info!(
                "Created SIP participant {} in room {}",
                participant.sip_participant_id, participant.room_name
            );
            Ok(participant)
        })
        .await
    }

    pub async fn list_sip_participant(&self) -> Result<Vec<SipParticipant>> {
        self.bounded("list_sip_participant", async {
            let participants = self.repository::<SipParticipant>()?.list().await?;
            debug!("Listed {} SIP participants", participants.len());
            Ok(participants)
        })
        .await
    }

    pub async fn delete_sip_participant(&self, sip_participant_id: &str) -> Result<SipParticipant> {
        self.bounded("delete_sip_participant", async {
            let participant = self
                .delete_entity::<SipParticipant>(sip_participant_id, |_| Ok(()))
                .await?;
            info!("Deleted SIP participant {}", participant.sip_participant_id);
            Ok(participant)
        })
        .await
    }

    /// Send DTMF digits on a participant's call leg.
    ///
    /// Fails with `Unimplemented` when no call control channel is attached.
    pub async fn send_sip_participant_dtmf(
        &self,
        sip_participant_id: &str,
        digits: &str,
    ) -> Result<DtmfResult> {
        self.bounded("send_sip_participant_dtmf", async {
            let participants = self.repository::<SipParticipant>()?;
            let digits = DtmfDigits::parse(digits)?;
            let participant = participants.load(sip_participant_id).await?;

            let control = self.call_control.as_ref().ok_or_else(|| {
                DomainError::Unimplemented(
                    "DTMF delivery needs a call control channel".to_string(),
                )
            })?;

            let result = control.send_dtmf(&participant, &digits).await?;
            info!(
                "Sent DTMF {} to SIP participant {}",
                digits.as_str(),
                participant.sip_participant_id
            );
            Ok(result)
        })
        .await
    }

    // ---- Dispatch ----

    /// Route an inbound call
    pub async fn match_sip_dispatch_rule(&self, call: &InboundCall) -> Result<DispatchDecision> {
        let result = self
            .bounded("match_sip_dispatch_rule", async {
                DispatchMatcher::new(self.store()?).match_call(call).await
            })
            .await;

        let outcome = match &result {
            Ok(_) => "routed",
            Err(e) => e.code(),
        };
        counter!("sip_dispatch_total", "result" => outcome).increment(1);
        result
    }

    // ---- Plumbing ----

    fn store(&self) -> Result<Arc<dyn EntityStore>> {
        self.store.clone().ok_or_else(|| {
            DomainError::NotReady("SIP registry is not connected to a store".to_string())
        })
    }

    fn repository<E: Entity>(&self) -> Result<Repository<E>> {
        Ok(Repository::new(self.store()?))
    }

    /// Load, check, delete. Returns the removed record.
    async fn delete_entity<E: Entity>(
        &self,
        id: &str,
        precondition: impl FnOnce(&E) -> Result<()>,
    ) -> Result<E> {
        let repo = self.repository::<E>()?;
        let entity = repo.load(id).await?;
        precondition(&entity)?;
        repo.delete(&entity).await?;
        Ok(entity)
    }

    /// Run an operation under the request timeout and count its outcome
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::DeadlineExceeded(format!(
                "{} did not finish within {:?}",
                op, self.request_timeout
            ))),
        };

        if let Err(e) = &result {
            warn!("{} failed: {}", op, e);
        }
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        counter!("sip_registry_operations_total", "op" => op, "result" => outcome).increment(1);

        result
    }
}
