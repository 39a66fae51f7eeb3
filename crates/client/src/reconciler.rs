//! Entity and asset reconciliation
//!
//! Proof responses are buffered by the tick they claim. When that tick is
//! confirmed each buffered proof is checked, in arrival order, against the
//! confirmed spectrum (entities) or universe (assets) digest. The first proof
//! that verifies updates the record; later ones for the same record are
//! dropped without penalising their peers.

use crate::asset::{AssetProof, AssetTable};
use crate::entity::{transfer_event, EntityTable};
use crate::events::ClientEvent;
use crate::store::TransactionStore;
use lrv_consensus::{verify_inclusion, ConfirmedTick};
use lrv_wire::{Crypto, EntityResponse};
use std::collections::BTreeMap;

/// Proofs kept per tick; anything beyond is dropped
const MAX_PROOFS_PER_TICK: usize = 4096;

/// Distinct ticks with buffered proofs, per record kind
const MAX_BUFFERED_TICKS: usize = 1024;

/// What the ledger needs to know besides the tables themselves
pub(crate) struct ReconcileContext<'a> {
    pub crypto: &'a dyn Crypto,
    pub store: &'a dyn TransactionStore,
    pub confirmed: &'a ConfirmedTick,
    pub system_tick: u32,
    pub execution_tick: u32,
}

#[derive(Debug, Default)]
pub(crate) struct Reconciliation {
    pub events: Vec<ClientEvent>,
    pub updated_entities: usize,
    pub cleared_transactions: usize,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    entities: BTreeMap<u32, Vec<EntityResponse>>,
    assets: BTreeMap<u32, Vec<AssetProof>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_entity(&mut self, response: EntityResponse) {
        let tick = response.tick;
        buffer(&mut self.entities, tick, response);
    }

    pub fn buffer_asset(&mut self, proof: AssetProof) {
        let tick = proof.tick();
        buffer(&mut self.assets, tick, proof);
    }

    /// Forget proofs for ticks before `tick`
    pub fn discard_before(&mut self, tick: u32) {
        self.entities = self.entities.split_off(&tick);
        self.assets = self.assets.split_off(&tick);
    }

    pub fn number_of_buffered_proofs(&self) -> usize {
        self.entities.values().map(Vec::len).sum::<usize>() + self.assets.values().map(Vec::len).sum::<usize>()
    }

    pub(crate) fn reconcile(
        &mut self,
        context: &ReconcileContext<'_>,
        entities: &mut EntityTable,
        assets: &mut AssetTable,
    ) -> Reconciliation {
        let mut reconciliation = Reconciliation::default();
        self.reconcile_entities(context, entities, &mut reconciliation);
        self.reconcile_assets(context, entities, assets, &mut reconciliation);
        reconciliation
    }

    fn reconcile_entities(
        &mut self,
        context: &ReconcileContext<'_>,
        entities: &mut EntityTable,
        reconciliation: &mut Reconciliation,
    ) {
        let crypto = context.crypto;
        let confirmed = context.confirmed;
        let tick = confirmed.tick();
        let Some(responses) = self.entities.remove(&tick) else {
            return;
        };

        for response in responses {
            let Some(entity) = entities.get_mut(&response.public_key) else {
                continue;
            };
            if entity.tick() >= tick || response.spectrum_index < 0 {
                continue;
            }
            if !verify_inclusion(
                crypto,
                &response.leaf(),
                response.spectrum_index.unsigned_abs(),
                &response.siblings,
                &confirmed.digests.spectrum,
            ) {
                tracing::debug!(tick, entity = %entity.id, "Entity proof does not match spectrum digest");
                continue;
            }

            let mut outgoing_transaction = None;
            let due = entity.pending.as_ref().map_or(false, |pending| pending.tick() <= tick);
            if let Some(pending) = due.then(|| entity.pending.take()).flatten() {
                let executed = pending.moves_funds() && response.latest_outgoing_transfer_tick == pending.tick();
                match context.store.archive(&entity.id, pending.tick()) {
                    Ok(()) => {
                        let transfer = transfer_event(crypto, &pending, executed);
                        if pending.moves_funds() {
                            reconciliation.events.push(ClientEvent::Transfer(transfer.clone()));
                        }
                        tracing::info!(tick = pending.tick(), entity = %entity.id, executed, "Outgoing transaction cleared");
                        reconciliation.cleared_transactions += 1;
                        outgoing_transaction = Some(transfer);
                    }
                    Err(error) => {
                        tracing::error!(entity = %entity.id, "Failed to archive transaction: {}", error);
                        reconciliation.events.push(ClientEvent::Error(error.to_string()));
                        entity.pending = Some(pending);
                    }
                }
            }
            if outgoing_transaction.is_none() {
                outgoing_transaction = entity
                    .pending
                    .as_ref()
                    .map(|pending| transfer_event(crypto, pending, false));
            }

            entity.apply(
                crypto,
                &response,
                tick,
                confirmed.epoch(),
                &confirmed.quorum.timestamp,
                confirmed.digests.spectrum,
            );
            reconciliation.updated_entities += 1;
            reconciliation.events.extend(entity.to_event(outgoing_transaction).map(ClientEvent::Entity));

            let ready = entity
                .pending
                .as_ref()
                .map_or(true, |pending| pending.tick() <= context.system_tick);
            if let Some(wallet) = entity.wallet.as_ref().filter(|_| ready) {
                let _ = wallet.send(context.execution_tick);
                reconciliation.events.push(ClientEvent::ExecutionTick {
                    id: entity.id.clone(),
                    tick: context.execution_tick,
                });
            }
        }
    }

    fn reconcile_assets(
        &mut self,
        context: &ReconcileContext<'_>,
        entities: &EntityTable,
        assets: &mut AssetTable,
        reconciliation: &mut Reconciliation,
    ) {
        let confirmed = context.confirmed;
        let tick = confirmed.tick();
        let Some(proofs) = self.assets.remove(&tick) else {
            return;
        };

        for proof in proofs {
            let Some(key) = proof.key() else {
                continue;
            };
            if !entities.contains(&key.holder) || assets.tick(&key) >= tick {
                continue;
            }
            if !verify_inclusion(
                context.crypto,
                proof.leaf(),
                proof.universe_index(),
                proof.siblings(),
                &confirmed.digests.universe,
            ) {
                tracing::debug!(tick, asset = %key.name, "Asset proof does not match universe digest");
                continue;
            }

            let event = assets.apply(context.crypto, key, &proof, confirmed.epoch(), confirmed.digests.universe);
            reconciliation.events.push(ClientEvent::Asset(event));
        }
    }
}

fn buffer<T>(buffered: &mut BTreeMap<u32, Vec<T>>, tick: u32, proof: T) {
    if !buffered.contains_key(&tick) && buffered.len() >= MAX_BUFFERED_TICKS {
        tracing::debug!(tick, "Proof buffer full, dropping proof");
        return;
    }
    let proofs = buffered.entry(tick).or_default();
    if proofs.len() < MAX_PROOFS_PER_TICK {
        proofs.push(proof);
    }
}
