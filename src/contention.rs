//! Picks which token account funds a purchase.
//!
//! A ticket that was preloaded through `TransferTokens` pays out of its own
//! associated token account, so concurrent buyers only lock their own
//! accounts. Only tickets with nothing preloaded fall back to the shared vault.

use crate::error::WhitelistError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FundingSource {
    /// The ticket's own preloaded token account
    Ticket,
    /// The whitelist's shared vault
    Vault,
}

impl FundingSource {
    /// Whether the whitelist record and vault must be locked for writing.
    pub fn writes_shared_accounts(&self) -> bool {
        matches!(self, FundingSource::Vault)
    }
}

/// Any non-zero `preloaded` amount recorded on the ticket is used; the vault
/// balance is never consulted here.
pub fn select_funding_source(preloaded: u64, amount: u64) -> Result<FundingSource, WhitelistError> {
    if preloaded == 0 {
        return Ok(FundingSource::Vault);
    }
    if preloaded < amount {
        return Err(WhitelistError::InsufficientTicketBalance);
    }
    Ok(FundingSource::Ticket)
}
