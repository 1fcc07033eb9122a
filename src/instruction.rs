use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::{Pubkey, PUBKEY_BYTES},
    system_program,
};

use crate::{contention::FundingSource, error::WhitelistError};

/// Arguments for creating a whitelist.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitArgs {
    pub mint: Pubkey,
    pub treasury: Pubkey,
    pub token_price: u64,
    pub buy_limit: u64,
    pub whitelist_size: u64,
    pub allow_registration: bool,
    pub registration_timestamp: i64,
    pub registration_duration: i64,
    pub sale_timestamp: i64,
    pub sale_duration: i64,
    pub token_program: Pubkey,
}

/// The subset of time fields an `AmendTimes` instruction changes. `None`
/// leaves the stored value untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeAmendment {
    pub registration_timestamp: Option<i64>,
    pub registration_duration: Option<i64>,
    pub sale_timestamp: Option<i64>,
    pub sale_duration: Option<i64>,
}

impl TimeAmendment {
    const REGISTRATION_TIMESTAMP: u8 = 1 << 0;
    const REGISTRATION_DURATION: u8 = 1 << 1;
    const SALE_TIMESTAMP: u8 = 1 << 2;
    const SALE_DURATION: u8 = 1 << 3;
    const ALL: u8 = 0b1111;

    fn fields(&self) -> [(u8, Option<i64>); 4] {
        [
            (Self::REGISTRATION_TIMESTAMP, self.registration_timestamp),
            (Self::REGISTRATION_DURATION, self.registration_duration),
            (Self::SALE_TIMESTAMP, self.sale_timestamp),
            (Self::SALE_DURATION, self.sale_duration),
        ]
    }

    /// Presence byte: one bit per field, in field order.
    pub fn mask(&self) -> u8 {
        self.fields()
            .iter()
            .filter(|(_, value)| value.is_some())
            .fold(0, |mask, (bit, _)| mask | bit)
    }

    pub fn is_empty(&self) -> bool {
        self.mask() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WhitelistInstruction {
    /// Creates the whitelist record and its vault.
    ///
    /// Accounts expected:
    ///
    /// 0. `[writable]` Whitelist account, derived from the mint
    /// 1. `[writable, signer]` Authority
    /// 2. `[writable]` Vault, the whitelist's associated token account
    /// 3. `[]` Token mint
    /// 4. `[]` Token program
    /// 5. `[]` System program
    /// 6. `[]` Associated token account program
    Init(InitArgs),

    /// Authority registers a user, bypassing the registration window.
    ///
    /// 0. `[]` Whitelist account
    /// 1. `[writable, signer]` Authority, pays for the ticket
    /// 2. `[]` User
    /// 3. `[writable]` Ticket account
    /// 4. `[]` System program
    AddUser,

    /// Authority closes a ticket. Preloaded tokens return to the vault and the
    /// ticket's lamports go to the authority.
    ///
    /// 0. `[writable]` Whitelist account
    /// 1. `[writable, signer]` Authority
    /// 2. `[writable]` Vault
    /// 3. `[]` Token mint
    /// 4. `[writable]` Ticket account
    /// 5. `[writable]` Ticket token account
    /// 6. `[]` Token program
    RemoveUser,

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    AmendWhitelistSize { size: u64 },

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    AmendTimes(TimeAmendment),

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    AllowRegistration { allow: bool },

    /// A user registers themselves while registration is open.
    ///
    /// 0. `[]` Whitelist account
    /// 1. `[writable, signer]` User, pays for the ticket
    /// 2. `[writable]` Ticket account
    /// 3. `[]` System program
    Register,

    /// A user closes their own ticket before buying anything. Preloaded tokens
    /// return to the vault and rent goes to the ticket's payer.
    ///
    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` User
    /// 2. `[writable]` Payer recorded on the ticket
    /// 3. `[writable]` Vault
    /// 4. `[]` Token mint
    /// 5. `[writable]` Ticket account
    /// 6. `[writable]` Ticket token account
    /// 7. `[]` Token program
    Unregister,

    /// Purchase `amount` tokens at the whitelist price.
    ///
    /// The whitelist and vault are only written when the ticket holds no
    /// preloaded balance; otherwise they may be passed read-only.
    ///
    /// 0. `[writable?]` Whitelist account
    /// 1. `[writable?]` Vault
    /// 2. `[]` Token mint
    /// 3. `[writable, signer]` Buyer
    /// 4. `[writable]` Ticket account
    /// 5. `[writable]` Ticket token account
    /// 6. `[writable]` Buyer token account
    /// 7. `[]` Token program
    /// 8. `[]` System program
    /// 9. `[]` Associated token account program
    Buy { amount: u64 },

    /// Moves sale supply into the vault. Anything beyond
    /// `whitelist_size * buy_limit` stays with the authority.
    ///
    /// 0. `[writable]` Whitelist account
    /// 1. `[writable]` Vault
    /// 2. `[]` Token mint
    /// 3. `[signer]` Authority
    /// 4. `[writable]` Authority token account
    /// 5. `[]` Token program
    DepositTokens { amount: u64 },

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    StartRegistration,

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    StartTokenSale,

    /// Preloads `amount` tokens from the vault into a ticket's own token
    /// account.
    ///
    /// 0. `[writable]` Whitelist account
    /// 1. `[writable, signer]` Authority
    /// 2. `[writable]` Vault
    /// 3. `[]` Token mint
    /// 4. `[writable]` Ticket account
    /// 5. `[writable]` Ticket token account
    /// 6. `[]` Token program
    /// 7. `[]` System program
    /// 8. `[]` Associated token account program
    TransferTokens { amount: u64 },

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    /// 2. `[writable]` Vault
    /// 3. `[]` Token mint
    /// 4. `[writable]` Recipient token account
    /// 5. `[]` Token program
    WithdrawTokens { amount: u64 },

    /// Sweeps one or more tickets: tokens back to the vault, lamports to the
    /// treasury.
    ///
    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    /// 2. `[writable]` Treasury
    /// 3. `[writable]` Vault
    /// 4. `[]` Token mint
    /// 5. `[]` Token program
    /// 6.. `[writable]` Ticket account, `[writable]` ticket token account, repeated
    BurnTicket,

    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    /// 2. `[writable]` Vault
    /// 3. `[]` Token mint
    /// 4. `[writable]` Recipient of the reclaimed lamports
    /// 5. `[writable]` Recipient token account
    /// 6. `[]` Token program
    TerminateWhitelist,

    /// Withdraws lamports held by the whitelist account above rent exemption.
    ///
    /// 0. `[writable]` Whitelist account
    /// 1. `[signer]` Authority
    /// 2. `[writable]` Recipient
    WithdrawSol { amount: u64 },
}

impl WhitelistInstruction {
    pub const INIT_LEN: usize = 1 + PUBKEY_BYTES * 3 + 8 * 3 + 1 + 8 * 4;

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Init(_) => 0,
            Self::AddUser => 1,
            Self::RemoveUser => 2,
            Self::AmendWhitelistSize { .. } => 3,
            Self::AmendTimes(_) => 4,
            Self::AllowRegistration { .. } => 5,
            Self::Register => 6,
            Self::Unregister => 7,
            Self::Buy { .. } => 8,
            Self::DepositTokens { .. } => 9,
            Self::StartRegistration => 10,
            Self::StartTokenSale => 11,
            Self::TransferTokens { .. } => 12,
            Self::WithdrawTokens { .. } => 13,
            Self::BurnTicket => 14,
            Self::TerminateWhitelist => 15,
            Self::WithdrawSol { .. } => 16,
        }
    }

    /// Unpacks a byte buffer into a [WhitelistInstruction](enum.WhitelistInstruction.html).
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = input
            .split_first()
            .ok_or(WhitelistError::InvalidInstruction)?;

        let (instruction, rest) = match tag {
            0 => {
                let (mint, rest) = Self::unpack_pubkey(rest)?;
                let (treasury, rest) = Self::unpack_pubkey(rest)?;
                let (token_price, rest) = Self::unpack_u64(rest)?;
                let (buy_limit, rest) = Self::unpack_u64(rest)?;
                let (whitelist_size, rest) = Self::unpack_u64(rest)?;
                let (allow_registration, rest) = Self::unpack_bool(rest)?;
                let (registration_timestamp, rest) = Self::unpack_i64(rest)?;
                let (registration_duration, rest) = Self::unpack_i64(rest)?;
                let (sale_timestamp, rest) = Self::unpack_i64(rest)?;
                let (sale_duration, rest) = Self::unpack_i64(rest)?;
                let (token_program, rest) = Self::unpack_pubkey(rest)?;
                (
                    Self::Init(InitArgs {
                        mint,
                        treasury,
                        token_price,
                        buy_limit,
                        whitelist_size,
                        allow_registration,
                        registration_timestamp,
                        registration_duration,
                        sale_timestamp,
                        sale_duration,
                        token_program,
                    }),
                    rest,
                )
            }
            1 => (Self::AddUser, rest),
            2 => (Self::RemoveUser, rest),
            3 => {
                let (size, rest) = Self::unpack_u64(rest)?;
                (Self::AmendWhitelistSize { size }, rest)
            }
            4 => {
                let (amendment, rest) = Self::unpack_time_amendment(rest)?;
                (Self::AmendTimes(amendment), rest)
            }
            5 => {
                let (allow, rest) = Self::unpack_bool(rest)?;
                (Self::AllowRegistration { allow }, rest)
            }
            6 => (Self::Register, rest),
            7 => (Self::Unregister, rest),
            8 => {
                let (amount, rest) = Self::unpack_u64(rest)?;
                (Self::Buy { amount }, rest)
            }
            9 => {
                let (amount, rest) = Self::unpack_u64(rest)?;
                (Self::DepositTokens { amount }, rest)
            }
            10 => (Self::StartRegistration, rest),
            11 => (Self::StartTokenSale, rest),
            12 => {
                let (amount, rest) = Self::unpack_u64(rest)?;
                (Self::TransferTokens { amount }, rest)
            }
            13 => {
                let (amount, rest) = Self::unpack_u64(rest)?;
                (Self::WithdrawTokens { amount }, rest)
            }
            14 => (Self::BurnTicket, rest),
            15 => (Self::TerminateWhitelist, rest),
            16 => {
                let (amount, rest) = Self::unpack_u64(rest)?;
                (Self::WithdrawSol { amount }, rest)
            }
            _ => return Err(WhitelistError::InvalidInstruction.into()),
        };

        if !rest.is_empty() {
            return Err(WhitelistError::InvalidInstructionLength.into());
        }
        Ok(instruction)
    }

    /// Packs a [WhitelistInstruction](enum.WhitelistInstruction.html) into a byte buffer.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::INIT_LEN);
        buf.push(self.opcode());
        match self {
            Self::Init(args) => {
                buf.extend_from_slice(args.mint.as_ref());
                buf.extend_from_slice(args.treasury.as_ref());
                buf.extend_from_slice(&args.token_price.to_le_bytes());
                buf.extend_from_slice(&args.buy_limit.to_le_bytes());
                buf.extend_from_slice(&args.whitelist_size.to_le_bytes());
                buf.push(args.allow_registration as u8);
                buf.extend_from_slice(&args.registration_timestamp.to_le_bytes());
                buf.extend_from_slice(&args.registration_duration.to_le_bytes());
                buf.extend_from_slice(&args.sale_timestamp.to_le_bytes());
                buf.extend_from_slice(&args.sale_duration.to_le_bytes());
                buf.extend_from_slice(args.token_program.as_ref());
            }
            Self::AmendTimes(amendment) => {
                buf.push(amendment.mask());
                for (_, value) in amendment.fields() {
                    if let Some(value) = value {
                        buf.extend_from_slice(&value.to_le_bytes());
                    }
                }
            }
            Self::AllowRegistration { allow } => buf.push(*allow as u8),
            Self::AmendWhitelistSize { size: amount }
            | Self::Buy { amount }
            | Self::DepositTokens { amount }
            | Self::TransferTokens { amount }
            | Self::WithdrawTokens { amount }
            | Self::WithdrawSol { amount } => buf.extend_from_slice(&amount.to_le_bytes()),
            Self::AddUser
            | Self::RemoveUser
            | Self::Register
            | Self::Unregister
            | Self::StartRegistration
            | Self::StartTokenSale
            | Self::BurnTicket
            | Self::TerminateWhitelist => {}
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(WhitelistError::InvalidInstructionLength)?;
        Ok((value, &input[8..]))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(i64::from_le_bytes)
            .ok_or(WhitelistError::InvalidInstructionLength)?;
        Ok((value, &input[8..]))
    }

    fn unpack_bool(input: &[u8]) -> Result<(bool, &[u8]), ProgramError> {
        let (&byte, rest) = input
            .split_first()
            .ok_or(WhitelistError::InvalidInstructionLength)?;
        match byte {
            0 => Ok((false, rest)),
            1 => Ok((true, rest)),
            _ => Err(WhitelistError::InvalidBool.into()),
        }
    }

    fn unpack_pubkey(input: &[u8]) -> Result<(Pubkey, &[u8]), ProgramError> {
        let key = input
            .get(..PUBKEY_BYTES)
            .and_then(|slice| <[u8; PUBKEY_BYTES]>::try_from(slice).ok())
            .map(Pubkey::new_from_array)
            .ok_or(WhitelistError::InvalidInstructionLength)?;
        Ok((key, &input[PUBKEY_BYTES..]))
    }

    fn unpack_time_amendment(input: &[u8]) -> Result<(TimeAmendment, &[u8]), ProgramError> {
        let (&mask, mut rest) = input
            .split_first()
            .ok_or(WhitelistError::InvalidInstructionLength)?;
        if mask & !TimeAmendment::ALL != 0 {
            return Err(WhitelistError::InvalidTimeMask.into());
        }

        let mut next = |bit: u8| -> Result<Option<i64>, ProgramError> {
            if mask & bit == 0 {
                return Ok(None);
            }
            let (value, tail) = Self::unpack_i64(rest)?;
            rest = tail;
            Ok(Some(value))
        };

        let amendment = TimeAmendment {
            registration_timestamp: next(TimeAmendment::REGISTRATION_TIMESTAMP)?,
            registration_duration: next(TimeAmendment::REGISTRATION_DURATION)?,
            sale_timestamp: next(TimeAmendment::SALE_TIMESTAMP)?,
            sale_duration: next(TimeAmendment::SALE_DURATION)?,
        };
        Ok((amendment, rest))
    }
}

fn authority_only(
    program_id: &Pubkey,
    data: WhitelistInstruction,
    whitelist: &Pubkey,
    authority: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: data.pack(),
    }
}

/// Creates an `Init` instruction
pub fn init(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    vault: &Pubkey,
    args: InitArgs,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(args.mint, false),
            AccountMeta::new_readonly(args.token_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        ],
        data: WhitelistInstruction::Init(args).pack(),
    }
}

/// Creates an `AddUser` instruction
pub fn add_user(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    user: &Pubkey,
    ticket: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*whitelist, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new(*ticket, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: WhitelistInstruction::AddUser.pack(),
    }
}

/// Creates a `RemoveUser` instruction
#[allow(clippy::too_many_arguments)]
pub fn remove_user(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    ticket: &Pubkey,
    ticket_token_account: &Pubkey,
    token_program_id: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*ticket, false),
            AccountMeta::new(*ticket_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
        ],
        data: WhitelistInstruction::RemoveUser.pack(),
    }
}

/// Creates an `AmendWhitelistSize` instruction
pub fn amend_whitelist_size(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    size: u64,
) -> Instruction {
    authority_only(
        program_id,
        WhitelistInstruction::AmendWhitelistSize { size },
        whitelist,
        authority,
    )
}

/// Creates an `AmendTimes` instruction
pub fn amend_times(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    amendment: TimeAmendment,
) -> Instruction {
    authority_only(
        program_id,
        WhitelistInstruction::AmendTimes(amendment),
        whitelist,
        authority,
    )
}

/// Creates an `AllowRegistration` instruction
pub fn allow_registration(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    allow: bool,
) -> Instruction {
    authority_only(
        program_id,
        WhitelistInstruction::AllowRegistration { allow },
        whitelist,
        authority,
    )
}

/// Creates a `Register` instruction
pub fn register(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    user: &Pubkey,
    ticket: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*whitelist, false),
            AccountMeta::new(*user, true),
            AccountMeta::new(*ticket, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: WhitelistInstruction::Register.pack(),
    }
}

/// Creates an `Unregister` instruction
#[allow(clippy::too_many_arguments)]
pub fn unregister(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    user: &Pubkey,
    payer: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    ticket: &Pubkey,
    ticket_token_account: &Pubkey,
    token_program_id: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new_readonly(*user, true),
            AccountMeta::new(*payer, false),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*ticket, false),
            AccountMeta::new(*ticket_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
        ],
        data: WhitelistInstruction::Unregister.pack(),
    }
}

/// Creates a `Buy` instruction. `source` decides whether the whitelist and
/// vault are locked for writing; pass [FundingSource::Ticket] only when the
/// ticket already holds a preloaded balance.
#[allow(clippy::too_many_arguments)]
pub fn buy(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    buyer: &Pubkey,
    ticket: &Pubkey,
    ticket_token_account: &Pubkey,
    buyer_token_account: &Pubkey,
    token_program_id: &Pubkey,
    source: FundingSource,
    amount: u64,
) -> Instruction {
    let shared = |key: &Pubkey| match source {
        FundingSource::Vault => AccountMeta::new(*key, false),
        FundingSource::Ticket => AccountMeta::new_readonly(*key, false),
    };

    Instruction {
        program_id: *program_id,
        accounts: vec![
            shared(whitelist),
            shared(vault),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*buyer, true),
            AccountMeta::new(*ticket, false),
            AccountMeta::new(*ticket_token_account, false),
            AccountMeta::new(*buyer_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        ],
        data: WhitelistInstruction::Buy { amount }.pack(),
    }
}

/// Creates a `DepositTokens` instruction
#[allow(clippy::too_many_arguments)]
pub fn deposit_tokens(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    authority_token_account: &Pubkey,
    token_program_id: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*authority_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
        ],
        data: WhitelistInstruction::DepositTokens { amount }.pack(),
    }
}

/// Creates a `StartRegistration` instruction
pub fn start_registration(program_id: &Pubkey, whitelist: &Pubkey, authority: &Pubkey) -> Instruction {
    authority_only(
        program_id,
        WhitelistInstruction::StartRegistration,
        whitelist,
        authority,
    )
}

/// Creates a `StartTokenSale` instruction
pub fn start_token_sale(program_id: &Pubkey, whitelist: &Pubkey, authority: &Pubkey) -> Instruction {
    authority_only(
        program_id,
        WhitelistInstruction::StartTokenSale,
        whitelist,
        authority,
    )
}

/// Creates a `TransferTokens` instruction
#[allow(clippy::too_many_arguments)]
pub fn transfer_tokens(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    ticket: &Pubkey,
    ticket_token_account: &Pubkey,
    token_program_id: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*ticket, false),
            AccountMeta::new(*ticket_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        ],
        data: WhitelistInstruction::TransferTokens { amount }.pack(),
    }
}

/// Creates a `WithdrawTokens` instruction
#[allow(clippy::too_many_arguments)]
pub fn withdraw_tokens(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    recipient_token_account: &Pubkey,
    token_program_id: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*recipient_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
        ],
        data: WhitelistInstruction::WithdrawTokens { amount }.pack(),
    }
}

/// Creates a `BurnTicket` instruction covering every `(ticket, ticket token
/// account)` pair in `tickets`.
#[allow(clippy::too_many_arguments)]
pub fn burn_tickets(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    treasury: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    token_program_id: &Pubkey,
    tickets: &[(Pubkey, Pubkey)],
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*whitelist, false),
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(*treasury, false),
        AccountMeta::new(*vault, false),
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    for (ticket, ticket_token_account) in tickets {
        accounts.push(AccountMeta::new(*ticket, false));
        accounts.push(AccountMeta::new(*ticket_token_account, false));
    }

    Instruction {
        program_id: *program_id,
        accounts,
        data: WhitelistInstruction::BurnTicket.pack(),
    }
}

/// Creates a `TerminateWhitelist` instruction
#[allow(clippy::too_many_arguments)]
pub fn terminate_whitelist(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    vault: &Pubkey,
    mint: &Pubkey,
    recipient: &Pubkey,
    recipient_token_account: &Pubkey,
    token_program_id: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*recipient, false),
            AccountMeta::new(*recipient_token_account, false),
            AccountMeta::new_readonly(*token_program_id, false),
        ],
        data: WhitelistInstruction::TerminateWhitelist.pack(),
    }
}

/// Creates a `WithdrawSol` instruction
pub fn withdraw_sol(
    program_id: &Pubkey,
    whitelist: &Pubkey,
    authority: &Pubkey,
    recipient: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*whitelist, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*recipient, false),
        ],
        data: WhitelistInstruction::WithdrawSol { amount }.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_init() -> InitArgs {
        InitArgs {
            mint: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
            token_price: 1_000_000,
            buy_limit: 500,
            whitelist_size: 10,
            allow_registration: true,
            registration_timestamp: 0,
            registration_duration: 0,
            sale_timestamp: 0,
            sale_duration: 0,
            token_program: spl_token::id(),
        }
    }

    #[test]
    fn init_encodes_to_154_bytes() {
        let args = scenario_init();
        let packed = WhitelistInstruction::Init(args).pack();

        assert_eq!(packed.len(), 154);
        assert_eq!(packed.len(), WhitelistInstruction::INIT_LEN);
        assert_eq!(packed[0], 0);
        assert_eq!(&packed[1..33], args.mint.as_ref());
        assert_eq!(&packed[65..73], &1_000_000u64.to_le_bytes());
        assert_eq!(packed[89], 1);
        assert_eq!(&packed[122..154], spl_token::id().as_ref());

        match WhitelistInstruction::unpack(&packed).unwrap() {
            WhitelistInstruction::Init(decoded) => assert_eq!(decoded, args),
            _ => panic!("expected Init"),
        }
    }

    #[test]
    fn payloadless_instructions_are_one_byte() {
        for (instruction, opcode) in [
            (WhitelistInstruction::AddUser, 1),
            (WhitelistInstruction::RemoveUser, 2),
            (WhitelistInstruction::Register, 6),
            (WhitelistInstruction::Unregister, 7),
            (WhitelistInstruction::StartRegistration, 10),
            (WhitelistInstruction::StartTokenSale, 11),
            (WhitelistInstruction::BurnTicket, 14),
            (WhitelistInstruction::TerminateWhitelist, 15),
        ] {
            let packed = instruction.pack();
            assert_eq!(packed, vec![opcode]);
            assert_eq!(WhitelistInstruction::unpack(&packed).unwrap().opcode(), opcode);
        }
    }

    #[test]
    fn amount_payloads() {
        let packed = WhitelistInstruction::Buy { amount: u64::MAX }.pack();
        assert_eq!(packed.len(), 9);
        assert_eq!(packed[0], 8);
        assert!(matches!(
            WhitelistInstruction::unpack(&packed).unwrap(),
            WhitelistInstruction::Buy { amount: u64::MAX }
        ));

        let packed = WhitelistInstruction::AmendWhitelistSize { size: 12 }.pack();
        assert_eq!(packed, [&[3u8][..], &12u64.to_le_bytes()[..]].concat());

        let packed = WhitelistInstruction::AllowRegistration { allow: false }.pack();
        assert_eq!(packed, vec![5, 0]);
    }

    #[test]
    fn amend_times_presence_byte() {
        let amendment = TimeAmendment {
            registration_timestamp: None,
            registration_duration: Some(i64::MIN),
            sale_timestamp: None,
            sale_duration: Some(-1),
        };
        let packed = WhitelistInstruction::AmendTimes(amendment).pack();

        assert_eq!(packed.len(), 1 + 1 + 16);
        assert_eq!(packed[1], 0b1010);
        assert_eq!(&packed[2..10], &i64::MIN.to_le_bytes());
        match WhitelistInstruction::unpack(&packed).unwrap() {
            WhitelistInstruction::AmendTimes(decoded) => assert_eq!(decoded, amendment),
            _ => panic!("expected AmendTimes"),
        }

        let empty = WhitelistInstruction::AmendTimes(TimeAmendment::default()).pack();
        assert_eq!(empty, vec![4, 0]);
    }

    #[test]
    fn rejects_malformed_input() {
        let err = |data: &[u8]| WhitelistInstruction::unpack(data).err().unwrap();

        assert_eq!(err(&[]), WhitelistError::InvalidInstruction.into());
        assert_eq!(err(&[17]), WhitelistError::InvalidInstruction.into());
        assert_eq!(err(&[8, 1, 2, 3]), WhitelistError::InvalidInstructionLength.into());
        assert_eq!(err(&[1, 0]), WhitelistError::InvalidInstructionLength.into());
        assert_eq!(err(&[5, 2]), WhitelistError::InvalidBool.into());
        assert_eq!(err(&[4, 0b1_0000]), WhitelistError::InvalidTimeMask.into());
        assert_eq!(
            err(&[4, 0b0001, 0, 0, 0]),
            WhitelistError::InvalidInstructionLength.into()
        );

        let mut init = WhitelistInstruction::Init(scenario_init()).pack();
        init.pop();
        assert_eq!(err(&init), WhitelistError::InvalidInstructionLength.into());
        init.extend_from_slice(&[0, 0]);
        assert_eq!(err(&init), WhitelistError::InvalidInstructionLength.into());
    }

    #[test]
    fn buy_locks_shared_accounts_only_for_vault_path() {
        let program_id = Pubkey::new_unique();
        let keys: Vec<Pubkey> = (0..7).map(|_| Pubkey::new_unique()).collect();
        let build = |source| {
            buy(
                &program_id,
                &keys[0],
                &keys[1],
                &keys[2],
                &keys[3],
                &keys[4],
                &keys[5],
                &keys[6],
                &spl_token::id(),
                source,
                1,
            )
        };

        let preloaded = build(FundingSource::Ticket);
        assert!(!preloaded.accounts[0].is_writable);
        assert!(!preloaded.accounts[1].is_writable);
        assert!(preloaded.accounts[4].is_writable);

        let fallback = build(FundingSource::Vault);
        assert!(fallback.accounts[0].is_writable);
        assert!(fallback.accounts[1].is_writable);
    }

    #[test]
    fn preload_records_onto_the_ticket() {
        let program_id = Pubkey::new_unique();
        let keys: Vec<Pubkey> = (0..6).map(|_| Pubkey::new_unique()).collect();
        let ix = transfer_tokens(
            &program_id,
            &keys[0],
            &keys[1],
            &keys[2],
            &keys[3],
            &keys[4],
            &keys[5],
            &spl_token::id(),
            300,
        );

        assert_eq!(ix.accounts[4].pubkey, keys[4]);
        assert!(ix.accounts[4].is_writable);
        assert_eq!(
            WhitelistInstruction::unpack(&ix.data).unwrap(),
            WhitelistInstruction::TransferTokens { amount: 300 }
        );
    }
}
