//! Sale lifecycle derived from the whitelist's time fields.
//!
//! Nothing in here touches accounts: every guard takes the current records and
//! a unix timestamp and either returns the updated record or an error, so the
//! processor can run all checks before its first write.

use solana_program::pubkey::Pubkey;

use crate::{
    error::WhitelistError,
    instruction::{InitArgs, TimeAmendment},
    state::{Ticket, Whitelist},
};

/// Phase of an existing whitelist. A missing account is either not yet
/// initialised or already terminated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Created,
    RegistrationOpen,
    RegistrationClosed,
    SaleOpen,
    SaleClosed,
}

fn window_end(start: i64, duration: i64) -> Option<i64> {
    if duration == 0 {
        None
    } else {
        Some(start.saturating_add(duration))
    }
}

impl Whitelist {
    pub fn from_init(
        args: &InitArgs,
        bump: u8,
        authority: Pubkey,
        vault: Pubkey,
        instance: u64,
    ) -> Result<Self, WhitelistError> {
        let whitelist = Whitelist {
            bump,
            authority,
            vault,
            treasury: args.treasury,
            mint: args.mint,
            token_price: args.token_price,
            buy_limit: args.buy_limit,
            deposited: 0,
            whitelist_size: args.whitelist_size,
            allow_registration: args.allow_registration,
            registration_timestamp: args.registration_timestamp,
            registration_duration: args.registration_duration,
            sale_timestamp: args.sale_timestamp,
            sale_duration: args.sale_duration,
            instance,
        };
        whitelist.check_times()?;
        Ok(whitelist)
    }

    /// Durations must be non-negative and every window end representable.
    pub fn check_times(&self) -> Result<(), WhitelistError> {
        for (start, duration) in [
            (self.registration_timestamp, self.registration_duration),
            (self.sale_timestamp, self.sale_duration),
        ] {
            if duration < 0 {
                return Err(WhitelistError::InvalidTimes);
            }
            start.checked_add(duration).ok_or(WhitelistError::Overflow)?;
        }
        Ok(())
    }

    pub fn registration_started(&self, now: i64) -> bool {
        now >= self.registration_timestamp
    }

    pub fn registration_ended(&self, now: i64) -> bool {
        window_end(self.registration_timestamp, self.registration_duration)
            .map_or(false, |end| now >= end)
    }

    pub fn sale_started(&self, now: i64) -> bool {
        now >= self.sale_timestamp
    }

    pub fn sale_ended(&self, now: i64) -> bool {
        window_end(self.sale_timestamp, self.sale_duration).map_or(false, |end| now >= end)
    }

    pub fn phase(&self, now: i64) -> Phase {
        if self.sale_ended(now) {
            Phase::SaleClosed
        } else if self.sale_started(now) {
            Phase::SaleOpen
        } else if self.registration_ended(now) {
            Phase::RegistrationClosed
        } else if self.registration_started(now) {
            Phase::RegistrationOpen
        } else {
            Phase::Created
        }
    }

    /// Self-registration guard: the flag must be set and `now` inside
    /// `[registration_timestamp, registration_timestamp + registration_duration)`.
    pub fn check_registration(&self, now: i64) -> Result<(), WhitelistError> {
        if !self.allow_registration {
            return Err(WhitelistError::RegistrationNotAllowed);
        }
        if !self.registration_started(now) {
            return Err(WhitelistError::RegistrationNotStarted);
        }
        if self.registration_ended(now) {
            return Err(WhitelistError::RegistrationFinished);
        }
        Ok(())
    }

    pub fn issue_ticket(&self, whitelist: Pubkey, owner: Pubkey, payer: Pubkey, bump: u8) -> Ticket {
        Ticket {
            bump,
            whitelist,
            owner,
            payer,
            allowance: self.buy_limit,
            amount_bought: 0,
            preloaded: 0,
            instance: self.instance,
        }
    }

    /// Rejects tickets issued by an earlier whitelist at the same address.
    pub fn check_ticket(&self, ticket: &Ticket) -> Result<(), WhitelistError> {
        if ticket.instance != self.instance || ticket.allowance > self.buy_limit {
            return Err(WhitelistError::StaleTicket);
        }
        Ok(())
    }

    pub fn with_size(&self, size: u64) -> Whitelist {
        Whitelist {
            whitelist_size: size,
            ..*self
        }
    }

    pub fn with_registration_allowed(&self, allow: bool) -> Whitelist {
        Whitelist {
            allow_registration: allow,
            ..*self
        }
    }

    /// Applies `amendment`, refusing to touch any field whose current value has
    /// already passed at `now`.
    pub fn amend_times(&self, amendment: &TimeAmendment, now: i64) -> Result<Whitelist, WhitelistError> {
        let elapsed = [
            (amendment.registration_timestamp, self.registration_started(now)),
            (amendment.registration_duration, self.registration_ended(now)),
            (amendment.sale_timestamp, self.sale_started(now)),
            (amendment.sale_duration, self.sale_ended(now)),
        ];
        if elapsed
            .iter()
            .any(|(value, elapsed)| value.is_some() && *elapsed)
        {
            return Err(WhitelistError::TimeElapsed);
        }

        let amended = Whitelist {
            registration_timestamp: amendment
                .registration_timestamp
                .unwrap_or(self.registration_timestamp),
            registration_duration: amendment
                .registration_duration
                .unwrap_or(self.registration_duration),
            sale_timestamp: amendment.sale_timestamp.unwrap_or(self.sale_timestamp),
            sale_duration: amendment.sale_duration.unwrap_or(self.sale_duration),
            ..*self
        };
        amended.check_times()?;
        Ok(amended)
    }

    /// Opens registration now unless it is already running; always re-enables
    /// self-registration.
    pub fn start_registration(&self, now: i64) -> Whitelist {
        let mut started = Whitelist {
            allow_registration: true,
            ..*self
        };
        if !self.registration_started(now) {
            started.registration_timestamp = now;
        }
        started
    }

    pub fn start_sale(&self, now: i64) -> Whitelist {
        let mut started = *self;
        if !self.sale_started(now) {
            started.sale_timestamp = now;
        }
        started
    }

    /// Lamports owed for `amount` tokens.
    pub fn purchase_cost(&self, amount: u64) -> Result<u64, WhitelistError> {
        amount
            .checked_mul(self.token_price)
            .ok_or(WhitelistError::Overflow)
    }

    /// Validates a purchase and returns the ticket with the amount recorded.
    pub fn check_buy(&self, ticket: &Ticket, amount: u64, now: i64) -> Result<Ticket, WhitelistError> {
        self.check_ticket(ticket)?;
        if !self.sale_started(now) {
            return Err(WhitelistError::SaleNotStarted);
        }
        if self.sale_ended(now) {
            return Err(WhitelistError::SaleEnded);
        }
        if amount == 0 {
            return Err(WhitelistError::InvalidAmount);
        }
        let amount_bought = ticket
            .amount_bought
            .checked_add(amount)
            .ok_or(WhitelistError::Overflow)?;
        if amount_bought > ticket.allowance {
            return Err(WhitelistError::BuyLimitExceeded);
        }
        Ok(Ticket {
            amount_bought,
            ..*ticket
        })
    }

    /// Validates moving `amount` vault tokens onto `ticket`. The preloaded
    /// total may not exceed what the ticket can still buy.
    pub fn check_preload(
        &self,
        ticket: &Ticket,
        amount: u64,
        now: i64,
    ) -> Result<(Whitelist, Ticket), WhitelistError> {
        self.check_ticket(ticket)?;
        if self.sale_ended(now) {
            return Err(WhitelistError::SaleEnded);
        }
        if amount == 0 {
            return Err(WhitelistError::InvalidAmount);
        }
        let preloaded = ticket
            .preloaded
            .checked_add(amount)
            .ok_or(WhitelistError::Overflow)?;
        if preloaded > ticket.remaining() {
            return Err(WhitelistError::BuyLimitExceeded);
        }
        Ok((self.debit(amount)?, Ticket { preloaded, ..*ticket }))
    }

    /// Most the vault needs to fulfil every ticket at the full buy limit.
    pub fn deposit_cap(&self) -> Result<u64, WhitelistError> {
        self.whitelist_size
            .checked_mul(self.buy_limit)
            .ok_or(WhitelistError::Overflow)
    }

    /// Credits a deposit, trimmed to the room left under [`Self::deposit_cap`].
    /// Returns the updated record and the amount actually accepted.
    pub fn accept_deposit(&self, amount: u64) -> Result<(Whitelist, u64), WhitelistError> {
        if amount == 0 {
            return Err(WhitelistError::InvalidAmount);
        }
        let room = self.deposit_cap()?.saturating_sub(self.deposited);
        if room == 0 {
            return Err(WhitelistError::DepositCapReached);
        }
        let accepted = amount.min(room);
        Ok((self.credit(accepted)?, accepted))
    }

    /// Vault funds are committed once the sale has started.
    pub fn check_withdraw(&self, amount: u64, now: i64) -> Result<Whitelist, WhitelistError> {
        if self.sale_started(now) {
            return Err(WhitelistError::SaleStarted);
        }
        if amount == 0 {
            return Err(WhitelistError::InvalidAmount);
        }
        self.debit(amount)
    }

    pub fn check_terminate(&self, now: i64) -> Result<(), WhitelistError> {
        if !self.sale_ended(now) {
            return Err(WhitelistError::SaleNotEnded);
        }
        Ok(())
    }

    /// Tickets may be swept once a fixed-length sale has closed, or at any
    /// point after an open-ended sale has started.
    pub fn check_burn(&self, now: i64) -> Result<(), WhitelistError> {
        if !self.sale_started(now) {
            return Err(WhitelistError::SaleNotStarted);
        }
        if self.sale_duration != 0 && !self.sale_ended(now) {
            return Err(WhitelistError::SaleNotEnded);
        }
        Ok(())
    }

    pub fn credit(&self, amount: u64) -> Result<Whitelist, WhitelistError> {
        let deposited = self
            .deposited
            .checked_add(amount)
            .ok_or(WhitelistError::Overflow)?;
        Ok(Whitelist { deposited, ..*self })
    }

    pub fn debit(&self, amount: u64) -> Result<Whitelist, WhitelistError> {
        let deposited = self
            .deposited
            .checked_sub(amount)
            .ok_or(WhitelistError::InsufficientFunds)?;
        Ok(Whitelist { deposited, ..*self })
    }
}

impl Ticket {
    /// Takes a ticket-funded purchase out of the preloaded balance.
    pub fn draw_preloaded(&self, amount: u64) -> Result<Ticket, WhitelistError> {
        let preloaded = self
            .preloaded
            .checked_sub(amount)
            .ok_or(WhitelistError::InsufficientTicketBalance)?;
        Ok(Ticket { preloaded, ..*self })
    }

    /// A user can only walk away from a ticket they have not bought with.
    pub fn check_unregister(&self, signer: &Pubkey) -> Result<(), WhitelistError> {
        if &self.owner != signer {
            return Err(WhitelistError::Unauthorised);
        }
        if self.amount_bought > 0 {
            return Err(WhitelistError::TicketHasPurchases);
        }
        Ok(())
    }
}
