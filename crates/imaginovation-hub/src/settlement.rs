//! Promise settlement.
//!
//! All settlement variants share one rule: the payout is the unpaid part of
//! the cumulative promise (`amount - settled`), capped by the hub's
//! available balance. `settled` only advances by what was actually paid, so
//! a promise cut short by an underfunded hub can be submitted again after a
//! top-up to collect the rest. An underfunded settlement moves the hub into
//! punishment.
//!
//! Settlement is split into a read-only plan and a commit step.
//! Every check runs while planning; committing cannot fail on funds.

use imaginovation_ledger::{Exchange, TokenLedger};
use imaginovation_types::{
    constants, verify_signer, Address, Amount, BeneficiaryBook, CallContext, ChannelId, HubPromise,
    HubStatus, ImaginovationError, Preimage, Result, Signature, WithdrawalBeneficiary,
};

use crate::hub::Hub;

/// Which parts of the common rule a settlement variant applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SettlementRules {
    take_fee: bool,
    ignore_stake: bool,
}

const REGULAR: SettlementRules = SettlementRules {
    take_fee: true,
    ignore_stake: false,
};

const FEE_FREE: SettlementRules = SettlementRules {
    take_fee: false,
    ignore_stake: true,
};

/// What a settlement would do, computed without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SettlementPlan {
    channel_id: ChannelId,
    /// Amount `settled` advances by.
    paid: Amount,
    transactor_fee: Amount,
    hub_fee: Amount,
    /// Whether the hub could not honour the full unpaid amount.
    underfunded: bool,
}

impl SettlementPlan {
    /// What remains for the beneficiary (or the stake) after fees.
    fn net_amount(&self) -> Amount {
        self.paid - self.transactor_fee - self.hub_fee
    }
}

/// Result of a committed settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub channel_id: ChannelId,
    /// True when this settlement created the provider-channel record.
    pub channel_created: bool,
    pub paid: Amount,
    pub transactor_fee: Amount,
    pub hub_fee: Amount,
    /// Tokens credited to the beneficiary or stake (native currency for DEX
    /// settlements).
    pub payout: Amount,
    /// Cumulative settled amount after this call.
    pub settled: Amount,
    pub entered_punishment: bool,
}

impl Hub {
    fn verify_promise(
        &self,
        channel_id: ChannelId,
        amount: Amount,
        fee: Amount,
        preimage: &Preimage,
        signature: &Signature,
    ) -> Result<()> {
        let promise = HubPromise {
            channel_id,
            amount,
            fee,
            hashlock: preimage.hashlock(),
        };
        verify_signer(&promise, &self.domain(), signature, &self.operator())
    }

    fn plan<L: TokenLedger + ?Sized>(
        &self,
        ctx: &CallContext,
        ledger: &L,
        channel_id: ChannelId,
        amount: Amount,
        transactor_fee: Amount,
        rules: SettlementRules,
    ) -> Result<SettlementPlan> {
        self.ensure_not_closed("settlement")?;
        if amount == 0 {
            return Err(ImaginovationError::InvalidAmount {
                reason: "promise amount must be positive".into(),
            });
        }
        let channel = self.channels.get(&channel_id).copied().unwrap_or_default();
        if !rules.ignore_stake && channel.settled == 0 && channel.stake < self.min_stake {
            return Err(ImaginovationError::BelowMinimumStake {
                stake: channel.stake,
                min: self.min_stake,
            });
        }
        if amount <= channel.settled {
            return Err(ImaginovationError::PromiseFullySettled {
                amount,
                settled: channel.settled,
            });
        }
        let unpaid = amount - channel.settled;
        if unpaid <= transactor_fee {
            return Err(ImaginovationError::InvalidAmount {
                reason: format!("unpaid {unpaid} does not exceed transactor fee {transactor_fee}"),
            });
        }

        let available = self.available_balance(ledger);
        let cap = self.max_stake.max(channel.stake);
        let paid = unpaid.min(available).min(cap);
        if paid == 0 && unpaid > available {
            // Nothing to pay out. The hub still owes the full amount.
            tracing::debug!(
                hub = %self.address,
                channel = %channel_id,
                unpaid,
                "Settlement planned with empty payout"
            );
            return Ok(SettlementPlan {
                channel_id,
                paid: 0,
                transactor_fee: 0,
                hub_fee: 0,
                underfunded: true,
            });
        }
        let hub_fee = if rules.take_fee {
            self.calculate_hub_fee(paid, ctx.now)
        } else {
            0
        };
        let fees = transactor_fee.saturating_add(hub_fee);
        if paid <= transactor_fee || paid < fees {
            return Err(ImaginovationError::InsufficientFunds {
                needed: unpaid,
                available,
            });
        }

        let plan = SettlementPlan {
            channel_id,
            paid,
            transactor_fee,
            hub_fee,
            underfunded: unpaid > available,
        };
        tracing::debug!(
            hub = %self.address,
            channel = %channel_id,
            unpaid,
            available,
            paid,
            hub_fee,
            "Settlement planned"
        );
        Ok(plan)
    }

    /// Advances `settled`, enters punishment if needed and pays the
    /// transactor. The net amount is left in the hub for the caller to route.
    fn commit<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        plan: &SettlementPlan,
    ) -> Result<SettlementReceipt> {
        let was_punished = self.status == HubStatus::Punishment;
        if plan.underfunded {
            self.enter_punishment(ctx.now)?;
        }
        ledger.transfer(&self.address, &ctx.caller, plan.transactor_fee)?;

        let lookup = self.get_or_create_channel(plan.channel_id);
        let channel_created = lookup.is_created();
        let channel = lookup.into_inner();
        channel.settled += plan.paid;
        let settled = channel.settled;

        Ok(SettlementReceipt {
            channel_id: plan.channel_id,
            channel_created,
            paid: plan.paid,
            transactor_fee: plan.transactor_fee,
            hub_fee: plan.hub_fee,
            payout: plan.net_amount(),
            settled,
            entered_punishment: plan.underfunded && !was_punished,
        })
    }

    fn log_settlement(&self, kind: &str, receipt: &SettlementReceipt) {
        tracing::info!(
            hub = %self.address,
            channel = %receipt.channel_id,
            kind,
            paid = receipt.paid,
            payout = receipt.payout,
            hub_fee = receipt.hub_fee,
            settled = receipt.settled,
            "Promise settled"
        );
    }

    /// Settles an operator-signed promise for `identity`, paying the
    /// identity's registered beneficiary.
    #[allow(clippy::too_many_arguments)]
    pub fn settle_promise<L, B>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        book: &B,
        identity: &Address,
        amount: Amount,
        transactor_fee: Amount,
        preimage: &Preimage,
        signature: &Signature,
    ) -> Result<SettlementReceipt>
    where
        L: TokenLedger + ?Sized,
        B: BeneficiaryBook + ?Sized,
    {
        let channel_id = self.channel_id(identity);
        self.verify_promise(channel_id, amount, transactor_fee, preimage, signature)?;
        let beneficiary = book
            .beneficiary_of(identity)
            .ok_or(ImaginovationError::UnknownIdentity(*identity))?;
        let plan = self.plan(ctx, &*ledger, channel_id, amount, transactor_fee, REGULAR)?;

        let receipt = self.commit(ctx, ledger, &plan)?;
        ledger.transfer(&self.address, &beneficiary, receipt.payout)?;
        self.log_settlement("regular", &receipt);
        Ok(receipt)
    }

    /// Applies an identity-signed beneficiary change, then settles to the
    /// new beneficiary. Both happen or neither does.
    #[allow(clippy::too_many_arguments)]
    pub fn settle_with_beneficiary<L, B>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        book: &mut B,
        identity: &Address,
        amount: Amount,
        transactor_fee: Amount,
        preimage: &Preimage,
        promise_signature: &Signature,
        new_beneficiary: Address,
        beneficiary_nonce: u64,
        beneficiary_signature: &Signature,
    ) -> Result<SettlementReceipt>
    where
        L: TokenLedger + ?Sized,
        B: BeneficiaryBook + ?Sized,
    {
        let channel_id = self.channel_id(identity);
        self.verify_promise(channel_id, amount, transactor_fee, preimage, promise_signature)?;
        let plan = self.plan(ctx, &*ledger, channel_id, amount, transactor_fee, REGULAR)?;
        book.change_beneficiary(identity, new_beneficiary, beneficiary_nonce, beneficiary_signature)?;

        let receipt = self.commit(ctx, ledger, &plan)?;
        ledger.transfer(&self.address, &new_beneficiary, receipt.payout)?;
        self.log_settlement("with-beneficiary", &receipt);
        Ok(receipt)
    }

    /// Settles into the identity's stake instead of paying out. No hub fee.
    pub fn settle_into_stake<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        identity: &Address,
        amount: Amount,
        transactor_fee: Amount,
        preimage: &Preimage,
        signature: &Signature,
    ) -> Result<SettlementReceipt> {
        let channel_id = self.channel_id(identity);
        self.verify_promise(channel_id, amount, transactor_fee, preimage, signature)?;
        let plan = self.plan(ctx, &*ledger, channel_id, amount, transactor_fee, FEE_FREE)?;
        let current = self.channels.get(&channel_id).map_or(0, |c| c.stake);
        let new_stake = current
            .checked_add(plan.net_amount())
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "settle into stake" })?;
        if plan.paid > 0 {
            self.check_stake_range(new_stake)?;
        }

        let receipt = self.commit(ctx, ledger, &plan)?;
        self.get_or_create_channel(channel_id).into_inner().stake = new_stake;
        self.total_stake = self.total_stake.saturating_add(receipt.payout);
        self.log_settlement("into-stake", &receipt);
        Ok(receipt)
    }

    /// Settles the identity's withdrawal channel to a beneficiary the
    /// identity signed for. No hub fee and no stake requirement.
    #[allow(clippy::too_many_arguments)]
    pub fn pay_and_settle<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        identity: &Address,
        amount: Amount,
        transactor_fee: Amount,
        preimage: &Preimage,
        promise_signature: &Signature,
        beneficiary: Address,
        identity_signature: &Signature,
    ) -> Result<SettlementReceipt> {
        let channel_id =
            ChannelId::with_purpose(identity, &self.address, constants::WITHDRAWAL_PURPOSE);
        self.verify_promise(channel_id, amount, transactor_fee, preimage, promise_signature)?;
        let authorization = WithdrawalBeneficiary {
            channel_id,
            amount,
            preimage: *preimage,
            beneficiary,
        };
        verify_signer(&authorization, &self.domain(), identity_signature, identity)?;
        let plan = self.plan(ctx, &*ledger, channel_id, amount, transactor_fee, FEE_FREE)?;

        let receipt = self.commit(ctx, ledger, &plan)?;
        ledger.transfer(&self.address, &beneficiary, receipt.payout)?;
        self.log_settlement("pay-and-settle", &receipt);
        Ok(receipt)
    }

    /// Regular settlement whose payout is swapped into native currency for
    /// the beneficiary.
    #[allow(clippy::too_many_arguments)]
    pub fn settle_with_dex<L, B>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        book: &B,
        identity: &Address,
        amount: Amount,
        transactor_fee: Amount,
        preimage: &Preimage,
        signature: &Signature,
    ) -> Result<SettlementReceipt>
    where
        L: Exchange + ?Sized,
        B: BeneficiaryBook + ?Sized,
    {
        let channel_id = self.channel_id(identity);
        self.verify_promise(channel_id, amount, transactor_fee, preimage, signature)?;
        let beneficiary = book
            .beneficiary_of(identity)
            .ok_or(ImaginovationError::UnknownIdentity(*identity))?;
        let plan = self.plan(ctx, &*ledger, channel_id, amount, transactor_fee, REGULAR)?;
        if plan.net_amount() > 0 {
            ledger.quote_tokens_for_native(plan.net_amount())?;
        }

        let mut receipt = self.commit(ctx, ledger, &plan)?;
        if receipt.payout > 0 {
            receipt.payout = ledger.swap_tokens_for_native(&self.address, &beneficiary, receipt.payout)?;
        }
        self.log_settlement("dex", &receipt);
        Ok(receipt)
    }
}
