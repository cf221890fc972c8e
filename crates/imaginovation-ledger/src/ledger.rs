//! In-memory fungible ledger.
//!
//! Holds settlement-token balances and allowances, native-currency balances,
//! and one constant-product pool whose reserves are simply the balances of
//! the pool's own address. Every mutation either fully applies or returns
//! an error before touching any balance.

use std::collections::BTreeMap;

use imaginovation_types::{Address, Amount, ImaginovationError, Result};
use crate::pool::get_amount_out;
use crate::supply_conservation::{Asset, SupplyConservation};

/// Standard fungible-token interface consumed by the protocol.
pub trait TokenLedger {
    fn balance_of(&self, account: &Address) -> Amount;

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()>;

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount);

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()>;
}

/// Token ledger with access to native currency and the swap pool.
pub trait Exchange: TokenLedger {
    fn native_balance_of(&self, account: &Address) -> Amount;

    /// Native currency bought by `tokens_in` at current reserves.
    fn quote_tokens_for_native(&self, tokens_in: Amount) -> Result<Amount>;

    /// Tokens bought by `native_in` at current reserves.
    fn quote_native_for_tokens(&self, native_in: Amount) -> Result<Amount>;

    /// Spends `native_in` of `payer`'s native currency, credits the bought
    /// tokens to `recipient`. Returns the token amount.
    fn swap_native_for_tokens(
        &mut self,
        payer: &Address,
        recipient: &Address,
        native_in: Amount,
    ) -> Result<Amount>;

    /// Spends `tokens_in` of `payer`'s tokens, credits the bought native
    /// currency to `recipient`. Returns the native amount.
    fn swap_tokens_for_native(
        &mut self,
        payer: &Address,
        recipient: &Address,
        tokens_in: Amount,
    ) -> Result<Amount>;
}

/// Balances of a single asset.
#[derive(Debug, Clone, Default)]
struct Balances {
    accounts: BTreeMap<Address, Amount>,
}

impl Balances {
    fn get(&self, account: &Address) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    fn total(&self) -> Amount {
        self.accounts.values().fold(0, |acc, v| acc.saturating_add(*v))
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let entry = self.accounts.entry(*account).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "credit" })?;
        Ok(())
    }

    fn move_funds(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        let available = self.get(from);
        if available < amount {
            return Err(ImaginovationError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        // Check the credit side first so a failure leaves both untouched.
        self.get(to)
            .checked_add(amount)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "credit" })?;
        self.accounts.insert(*from, available - amount);
        self.credit(to, amount)
    }
}

/// Token, native currency and swap pool in one deterministic ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    token: Balances,
    native: Balances,
    allowances: BTreeMap<(Address, Address), Amount>,
    pool: Address,
    supply: SupplyConservation,
}

impl Ledger {
    /// Empty ledger whose swap pool lives at `pool`.
    #[must_use]
    pub fn new(pool: Address) -> Self {
        Self {
            token: Balances::default(),
            native: Balances::default(),
            allowances: BTreeMap::new(),
            pool,
            supply: SupplyConservation::new(),
        }
    }

    #[must_use]
    pub fn pool_address(&self) -> Address {
        self.pool
    }

    /// Issues new tokens.
    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<()> {
        self.token.credit(to, amount)?;
        self.supply.record_mint(Asset::Token, amount);
        Ok(())
    }

    /// Issues new native currency.
    pub fn mint_native(&mut self, to: &Address, amount: Amount) -> Result<()> {
        self.native.credit(to, amount)?;
        self.supply.record_mint(Asset::Native, amount);
        Ok(())
    }

    pub fn transfer_native(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.native.move_funds(from, to, amount)
    }

    /// Adds liquidity to the swap pool out of freshly minted funds.
    pub fn seed_pool(&mut self, token_reserve: Amount, native_reserve: Amount) -> Result<()> {
        let pool = self.pool;
        self.mint(&pool, token_reserve)?;
        self.mint_native(&pool, native_reserve)
    }

    /// Pool reserves as `(token, native)`.
    #[must_use]
    pub fn reserves(&self) -> (Amount, Amount) {
        (self.token.get(&self.pool), self.native.get(&self.pool))
    }

    /// Checks both assets against their issued supply.
    pub fn verify_supply(&self) -> Result<()> {
        self.supply.verify(Asset::Token, self.token.total())?;
        self.supply.verify(Asset::Native, self.native.total())
    }
}

impl TokenLedger for Ledger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.token.get(account)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.token.move_funds(from, to, amount)?;
        tracing::trace!(from = %from, to = %to, amount, "Token transfer");
        Ok(())
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        self.allowances.insert((*owner, *spender), amount);
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()> {
        let approved = self.allowance(from, spender);
        if approved < amount {
            return Err(ImaginovationError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }
        self.transfer(from, to, amount)?;
        self.allowances.insert((*from, *spender), approved - amount);
        Ok(())
    }
}

impl Exchange for Ledger {
    fn native_balance_of(&self, account: &Address) -> Amount {
        self.native.get(account)
    }

    fn quote_tokens_for_native(&self, tokens_in: Amount) -> Result<Amount> {
        let (token_reserve, native_reserve) = self.reserves();
        get_amount_out(tokens_in, token_reserve, native_reserve)
    }

    fn quote_native_for_tokens(&self, native_in: Amount) -> Result<Amount> {
        let (token_reserve, native_reserve) = self.reserves();
        get_amount_out(native_in, native_reserve, token_reserve)
    }

    fn swap_native_for_tokens(
        &mut self,
        payer: &Address,
        recipient: &Address,
        native_in: Amount,
    ) -> Result<Amount> {
        let available = self.native.get(payer);
        if available < native_in {
            return Err(ImaginovationError::InsufficientFunds {
                needed: native_in,
                available,
            });
        }
        let tokens_out = self.quote_native_for_tokens(native_in)?;
        let pool = self.pool;
        self.native.move_funds(payer, &pool, native_in)?;
        self.token.move_funds(&pool, recipient, tokens_out)?;
        tracing::debug!(payer = %payer, recipient = %recipient, native_in, tokens_out, "Swapped native for tokens");
        Ok(tokens_out)
    }

    fn swap_tokens_for_native(
        &mut self,
        payer: &Address,
        recipient: &Address,
        tokens_in: Amount,
    ) -> Result<Amount> {
        let available = self.token.get(payer);
        if available < tokens_in {
            return Err(ImaginovationError::InsufficientFunds {
                needed: tokens_in,
                available,
            });
        }
        let native_out = self.quote_tokens_for_native(tokens_in)?;
        let pool = self.pool;
        self.token.move_funds(payer, &pool, tokens_in)?;
        self.native.move_funds(&pool, recipient, native_out)?;
        tracing::debug!(payer = %payer, recipient = %recipient, tokens_in, native_out, "Swapped tokens for native");
        Ok(native_out)
    }
}
