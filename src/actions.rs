//! The three user actions, each one ledger transaction.
//!
//! A dispatcher's only responsibilities are accurate request construction
//! and faithful error surfacing: "at most one winner", "no double join" and
//! every other consistency rule is enforced by the contract, never locked
//! here. Failures are normalized to a single human-readable message, and
//! nothing is resubmitted automatically — retrying a transaction risks a
//! double spend or double join.

use crate::config::{self, CONTRACT_MODULE, ENTRY_FEE, JOIN_GAS_BUDGET, MIN_PARTICIPANTS};
use crate::errors::{FailurePayload, RaffleAbort, classify};
use crate::finalize::verify_transaction;
use crate::ledger::{CallArg, Ledger, ObjectId, TransactionPlan, TransactionReceipt, Wallet};
use crate::snapshot::SnapshotReader;
use color_eyre::eyre::{Result, eyre};
use tracing::info;

pub struct RaffleActions<L, W> {
    ledger: L,
    wallet: W,
    package: ObjectId,
    reader: SnapshotReader<L>,
}

impl<L: Ledger + Clone, W: Wallet> RaffleActions<L, W> {
    pub fn new(ledger: L, wallet: W, package: ObjectId) -> Self {
        let reader = SnapshotReader::new(ledger.clone(), package);
        Self {
            ledger,
            wallet,
            package,
            reader,
        }
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    /// Create a new raffle owned by the connected account.
    pub async fn create_raffle(&self) -> Result<TransactionReceipt> {
        let mut plan = TransactionPlan::new();
        plan.move_call(self.package, CONTRACT_MODULE, "create_raffle", Vec::new());
        self.submit(plan, "create raffle").await
    }

    /// Join a raffle, paying the fixed entry fee from the gas coin. The
    /// unspent remainder is transferred back explicitly: the contract does
    /// not auto-return unused value, and a dangling coin fails validation.
    pub async fn join_raffle(&self, raffle_id: &ObjectId) -> Result<TransactionReceipt> {
        let mut plan = TransactionPlan::new();
        let payment = plan.split_from_gas(ENTRY_FEE);
        plan.move_call(
            self.package,
            CONTRACT_MODULE,
            "join",
            vec![
                CallArg::Object { id: *raffle_id },
                CallArg::Result { index: payment },
            ],
        );
        plan.transfer_to_sender(payment);
        plan.set_gas_budget(JOIN_GAS_BUDGET);
        self.submit(plan, "join raffle").await
    }

    /// Draw a winner using the well-known randomness object. When current
    /// state is readable and shows too few entrants, fail before submitting;
    /// otherwise the on-chain abort classifies to the same message.
    pub async fn pick_winner(&self, raffle_id: &ObjectId) -> Result<TransactionReceipt> {
        self.reader.invalidate(raffle_id);
        if let Ok(Some(snapshot)) = self.reader.fetch(raffle_id).await
            && snapshot.entrant_count < MIN_PARTICIPANTS
        {
            return Err(eyre!(RaffleAbort::InsufficientParticipants.to_string()));
        }

        let mut plan = TransactionPlan::new();
        plan.move_call(
            self.package,
            CONTRACT_MODULE,
            "pick_winner",
            vec![
                CallArg::Object { id: *raffle_id },
                CallArg::Object {
                    id: config::random_object(),
                },
            ],
        );
        self.submit(plan, "pick winner").await
    }

    async fn submit(&self, plan: TransactionPlan, context: &str) -> Result<TransactionReceipt> {
        let receipt = match self.wallet.sign_and_execute(&plan).await {
            Ok(receipt) => receipt,
            Err(err) => {
                let payload = FailurePayload::Text(format!("{err:#}"));
                return Err(eyre!(classify(&payload, context)));
            }
        };
        info!(%context, digest = %receipt.digest, "transaction submitted");
        verify_transaction(&receipt, &self.ledger, context).await?;
        Ok(receipt)
    }
}
