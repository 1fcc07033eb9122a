//! Program-derived addresses for whitelist and ticket accounts.
//!
//! Every address is computed from explicit seeds and an explicit program id;
//! nothing here reaches for `crate::id()`.

use solana_program::pubkey::Pubkey;

use crate::{error::WhitelistError, SEED};

/// Walks the bump seed from 255 down to 0 and returns the first address that
/// falls off the ed25519 curve, together with that bump.
pub fn derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), WhitelistError> {
    for candidate in (0..=u8::MAX).rev() {
        let bump = [candidate];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump);

        if let Ok(address) = Pubkey::create_program_address(&with_bump, program_id) {
            return Ok((address, candidate));
        }
    }

    Err(WhitelistError::DerivationExhausted)
}

pub fn derive_whitelist_address(
    mint: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), WhitelistError> {
    derive_address(&[SEED, mint.as_ref()], program_id)
}

pub fn derive_ticket_address(
    owner: &Pubkey,
    whitelist: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), WhitelistError> {
    derive_address(&[SEED, owner.as_ref(), whitelist.as_ref()], program_id)
}

/// Token account holding the whitelist's shared sale supply.
pub fn vault_address(whitelist: &Pubkey, mint: &Pubkey, token_program_id: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(
        whitelist,
        mint,
        token_program_id,
    )
}

/// Token account holding a ticket's preloaded allotment.
pub fn ticket_token_address(ticket: &Pubkey, mint: &Pubkey, token_program_id: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(
        ticket,
        mint,
        token_program_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let program_id = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let first = derive_whitelist_address(&mint, &program_id).unwrap();
        let second = derive_whitelist_address(&mint, &program_id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn derivation_picks_highest_valid_bump() {
        let program_id = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let whitelist = Pubkey::new_unique();

        let (address, bump) = derive_ticket_address(&owner, &whitelist, &program_id).unwrap();
        let seeds: &[&[u8]] = &[SEED, owner.as_ref(), whitelist.as_ref()];

        assert_eq!(
            (address, bump),
            Pubkey::find_program_address(seeds, &program_id)
        );
        for higher in (u16::from(bump) + 1)..=u16::from(u8::MAX) {
            assert!(Pubkey::create_program_address(
                &[SEED, owner.as_ref(), whitelist.as_ref(), &[higher as u8]],
                &program_id
            )
            .is_err());
        }
    }

    #[test]
    fn seeds_separate_records() {
        let program_id = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let user = Pubkey::new_unique();

        let (whitelist, _) = derive_whitelist_address(&mint, &program_id).unwrap();
        let (ticket, _) = derive_ticket_address(&user, &whitelist, &program_id).unwrap();
        let (other_ticket, _) =
            derive_ticket_address(&Pubkey::new_unique(), &whitelist, &program_id).unwrap();

        assert!(!whitelist.is_on_curve());
        assert_ne!(ticket, whitelist);
        assert_ne!(ticket, other_ticket);
    }
}
