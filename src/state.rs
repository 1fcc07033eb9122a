use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};

use solana_program::{
    account_info::AccountInfo,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::{Pubkey, PUBKEY_BYTES},
};

use crate::{
    error::WhitelistError,
    pda::{derive_ticket_address, derive_whitelist_address},
};

/// Sale parameters for a single mint. Lives at `[SEED, mint]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Whitelist {
    pub bump: u8,
    pub authority: Pubkey,
    pub vault: Pubkey,
    pub treasury: Pubkey,
    pub mint: Pubkey,
    pub token_price: u64,
    pub buy_limit: u64,
    /// Sale supply currently accounted to the vault
    pub deposited: u64,
    pub whitelist_size: u64,
    pub allow_registration: bool,
    pub registration_timestamp: i64,
    /// 0 leaves registration open-ended
    pub registration_duration: i64,
    pub sale_timestamp: i64,
    /// 0 leaves the sale open-ended
    pub sale_duration: i64,
    /// Slot the record was initialised in. Tickets carry a copy so that a
    /// whitelist re-created for the same mint does not honour them.
    pub instance: u64,
}

/// Proof of registration for one user on one whitelist. Lives at
/// `[SEED, owner, whitelist]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ticket {
    pub bump: u8,
    pub whitelist: Pubkey,
    pub owner: Pubkey,
    /// Funded the account; receives the rent back on unregister
    pub payer: Pubkey,
    pub allowance: u64,
    pub amount_bought: u64,
    /// Vault tokens moved onto the ticket's token account and not yet bought
    pub preloaded: u64,
    pub instance: u64,
}

impl Sealed for Whitelist {}

impl IsInitialized for Whitelist {
    fn is_initialized(&self) -> bool {
        self.mint != Pubkey::default()
    }
}

impl Pack for Whitelist {
    const LEN: usize = 202;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Whitelist::LEN];
        let (
            bump,
            authority,
            vault,
            treasury,
            mint,
            token_price,
            buy_limit,
            deposited,
            whitelist_size,
            allow_registration,
            registration_timestamp,
            registration_duration,
            sale_timestamp,
            sale_duration,
            instance,
        ) = array_refs![
            src,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            8,
            8,
            8,
            8,
            1,
            8,
            8,
            8,
            8,
            8
        ];

        Ok(Whitelist {
            bump: bump[0],
            authority: Pubkey::new_from_array(*authority),
            vault: Pubkey::new_from_array(*vault),
            treasury: Pubkey::new_from_array(*treasury),
            mint: Pubkey::new_from_array(*mint),
            token_price: u64::from_le_bytes(*token_price),
            buy_limit: u64::from_le_bytes(*buy_limit),
            deposited: u64::from_le_bytes(*deposited),
            whitelist_size: u64::from_le_bytes(*whitelist_size),
            allow_registration: unpack_bool(allow_registration)?,
            registration_timestamp: i64::from_le_bytes(*registration_timestamp),
            registration_duration: i64::from_le_bytes(*registration_duration),
            sale_timestamp: i64::from_le_bytes(*sale_timestamp),
            sale_duration: i64::from_le_bytes(*sale_duration),
            instance: u64::from_le_bytes(*instance),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Whitelist::LEN];
        let (
            bump_dst,
            authority_dst,
            vault_dst,
            treasury_dst,
            mint_dst,
            token_price_dst,
            buy_limit_dst,
            deposited_dst,
            whitelist_size_dst,
            allow_registration_dst,
            registration_timestamp_dst,
            registration_duration_dst,
            sale_timestamp_dst,
            sale_duration_dst,
            instance_dst,
        ) = mut_array_refs![
            dst,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            8,
            8,
            8,
            8,
            1,
            8,
            8,
            8,
            8,
            8
        ];

        bump_dst[0] = self.bump;
        authority_dst.copy_from_slice(self.authority.as_ref());
        vault_dst.copy_from_slice(self.vault.as_ref());
        treasury_dst.copy_from_slice(self.treasury.as_ref());
        mint_dst.copy_from_slice(self.mint.as_ref());
        *token_price_dst = self.token_price.to_le_bytes();
        *buy_limit_dst = self.buy_limit.to_le_bytes();
        *deposited_dst = self.deposited.to_le_bytes();
        *whitelist_size_dst = self.whitelist_size.to_le_bytes();
        allow_registration_dst[0] = self.allow_registration as u8;
        *registration_timestamp_dst = self.registration_timestamp.to_le_bytes();
        *registration_duration_dst = self.registration_duration.to_le_bytes();
        *sale_timestamp_dst = self.sale_timestamp.to_le_bytes();
        *sale_duration_dst = self.sale_duration.to_le_bytes();
        *instance_dst = self.instance.to_le_bytes();
    }
}

impl Sealed for Ticket {}

impl IsInitialized for Ticket {
    fn is_initialized(&self) -> bool {
        self.owner != Pubkey::default()
    }
}

impl Pack for Ticket {
    const LEN: usize = 129;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Ticket::LEN];
        let (bump, whitelist, owner, payer, allowance, amount_bought, preloaded, instance) =
            array_refs![src, 1, PUBKEY_BYTES, PUBKEY_BYTES, PUBKEY_BYTES, 8, 8, 8, 8];

        Ok(Ticket {
            bump: bump[0],
            whitelist: Pubkey::new_from_array(*whitelist),
            owner: Pubkey::new_from_array(*owner),
            payer: Pubkey::new_from_array(*payer),
            allowance: u64::from_le_bytes(*allowance),
            amount_bought: u64::from_le_bytes(*amount_bought),
            preloaded: u64::from_le_bytes(*preloaded),
            instance: u64::from_le_bytes(*instance),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Ticket::LEN];
        let (
            bump_dst,
            whitelist_dst,
            owner_dst,
            payer_dst,
            allowance_dst,
            amount_bought_dst,
            preloaded_dst,
            instance_dst,
        ) = mut_array_refs![dst, 1, PUBKEY_BYTES, PUBKEY_BYTES, PUBKEY_BYTES, 8, 8, 8, 8];

        bump_dst[0] = self.bump;
        whitelist_dst.copy_from_slice(self.whitelist.as_ref());
        owner_dst.copy_from_slice(self.owner.as_ref());
        payer_dst.copy_from_slice(self.payer.as_ref());
        *allowance_dst = self.allowance.to_le_bytes();
        *amount_bought_dst = self.amount_bought.to_le_bytes();
        *preloaded_dst = self.preloaded.to_le_bytes();
        *instance_dst = self.instance.to_le_bytes();
    }
}

fn unpack_bool(src: &[u8; 1]) -> Result<bool, ProgramError> {
    match src {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(WhitelistError::InvalidAccountData.into()),
    }
}

impl Whitelist {
    /// Confirms `address` is the canonical derivation for this record's mint
    /// and that the stored bump is the one the derivation produced.
    pub fn verify_address(&self, address: &Pubkey, program_id: &Pubkey) -> Result<(), ProgramError> {
        let (expected, bump) = derive_whitelist_address(&self.mint, program_id)?;
        if address != &expected || self.bump != bump {
            return Err(WhitelistError::InvalidWhitelistAddress.into());
        }
        Ok(())
    }

    /// Reads the whitelist record stored in `account`, rejecting accounts the
    /// program does not own or that sit at a non-canonical address.
    pub fn load(account: &AccountInfo, program_id: &Pubkey) -> Result<Self, ProgramError> {
        if account.owner != program_id || account.data_is_empty() {
            return Err(WhitelistError::WhitelistNotInitialized.into());
        }
        let whitelist = Self::unpack(&account.try_borrow_data()?)?;
        whitelist.verify_address(account.key, program_id)?;
        Ok(whitelist)
    }

    pub fn store(&self, account: &AccountInfo) -> Result<(), ProgramError> {
        Self::pack(*self, &mut account.try_borrow_mut_data()?)
    }
}

impl Ticket {
    pub fn verify_address(
        &self,
        address: &Pubkey,
        whitelist: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<(), ProgramError> {
        if &self.whitelist != whitelist {
            return Err(WhitelistError::InvalidTicketAddress.into());
        }
        let (expected, bump) = derive_ticket_address(&self.owner, whitelist, program_id)?;
        if address != &expected || self.bump != bump {
            return Err(WhitelistError::InvalidTicketAddress.into());
        }
        Ok(())
    }

    pub fn load(
        account: &AccountInfo,
        whitelist: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Self, ProgramError> {
        if account.owner != program_id || account.data_is_empty() {
            return Err(WhitelistError::TicketNotFound.into());
        }
        let ticket = Self::unpack(&account.try_borrow_data()?)?;
        ticket.verify_address(account.key, whitelist, program_id)?;
        Ok(ticket)
    }

    pub fn store(&self, account: &AccountInfo) -> Result<(), ProgramError> {
        Self::pack(*self, &mut account.try_borrow_mut_data()?)
    }

    /// Allowance still available for purchase.
    pub fn remaining(&self) -> u64 {
        self.allowance.saturating_sub(self.amount_bought)
    }
}
