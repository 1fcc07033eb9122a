use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{rent::Rent, Sysvar},
};

use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as TokenAccount, Mint},
};

use crate::{
    contention::{select_funding_source, FundingSource},
    error::WhitelistError,
    instruction::{InitArgs, TimeAmendment, WhitelistInstruction},
    pda::{derive_ticket_address, derive_whitelist_address, ticket_token_address, vault_address},
    state::{Ticket, Whitelist},
    SEED,
};

pub struct Processor;
impl Processor {
    pub fn process(program_id: &Pubkey, accounts: &[AccountInfo], instruction_data: &[u8]) -> ProgramResult {
        let instruction = WhitelistInstruction::unpack(instruction_data)?;

        match instruction {
            WhitelistInstruction::Init(args) => {
                msg!("Instruction: Init");
                Self::process_init(accounts, args, program_id)
            }
            WhitelistInstruction::AddUser => {
                msg!("Instruction: AddUser");
                Self::process_add_user(accounts, program_id)
            }
            WhitelistInstruction::RemoveUser => {
                msg!("Instruction: RemoveUser");
                Self::process_remove_user(accounts, program_id)
            }
            WhitelistInstruction::AmendWhitelistSize { size } => {
                msg!("Instruction: AmendWhitelistSize");
                Self::process_amend_whitelist_size(accounts, size, program_id)
            }
            WhitelistInstruction::AmendTimes(amendment) => {
                msg!("Instruction: AmendTimes");
                Self::process_amend_times(accounts, amendment, program_id)
            }
            WhitelistInstruction::AllowRegistration { allow } => {
                msg!("Instruction: AllowRegistration");
                Self::process_allow_registration(accounts, allow, program_id)
            }
            WhitelistInstruction::Register => {
                msg!("Instruction: Register");
                Self::process_register(accounts, program_id)
            }
            WhitelistInstruction::Unregister => {
                msg!("Instruction: Unregister");
                Self::process_unregister(accounts, program_id)
            }
            WhitelistInstruction::Buy { amount } => {
                msg!("Instruction: Buy");
                Self::process_buy(accounts, amount, program_id)
            }
            WhitelistInstruction::DepositTokens { amount } => {
                msg!("Instruction: DepositTokens");
                Self::process_deposit_tokens(accounts, amount, program_id)
            }
            WhitelistInstruction::StartRegistration => {
                msg!("Instruction: StartRegistration");
                Self::process_start_registration(accounts, program_id)
            }
            WhitelistInstruction::StartTokenSale => {
                msg!("Instruction: StartTokenSale");
                Self::process_start_token_sale(accounts, program_id)
            }
            WhitelistInstruction::TransferTokens { amount } => {
                msg!("Instruction: TransferTokens");
                Self::process_transfer_tokens(accounts, amount, program_id)
            }
            WhitelistInstruction::WithdrawTokens { amount } => {
                msg!("Instruction: WithdrawTokens");
                Self::process_withdraw_tokens(accounts, amount, program_id)
            }
            WhitelistInstruction::BurnTicket => {
                msg!("Instruction: BurnTicket");
                Self::process_burn_tickets(accounts, program_id)
            }
            WhitelistInstruction::TerminateWhitelist => {
                msg!("Instruction: TerminateWhitelist");
                Self::process_terminate_whitelist(accounts, program_id)
            }
            WhitelistInstruction::WithdrawSol { amount } => {
                msg!("Instruction: WithdrawSol");
                Self::process_withdraw_sol(accounts, amount, program_id)
            }
        }
    }

    fn process_init(accounts: &[AccountInfo], args: InitArgs, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let system_program_account = next_account_info(account_info_iter)?;
        let ata_program = next_account_info(account_info_iter)?;

        if !authority.is_signer {
            return Err(WhitelistError::MissingSignature.into());
        }
        check_system_program(system_program_account)?;
        check_ata_program(ata_program)?;
        spl_token_2022::check_spl_token_program_account(token_program.key)?;
        if token_program.key != &args.token_program {
            return Err(ProgramError::IncorrectProgramId);
        }
        if mint.key != &args.mint {
            return Err(WhitelistError::IncorrectMintAddress.into());
        }
        if mint.owner != token_program.key {
            return Err(WhitelistError::IllegalMintOwner.into());
        }
        mint_decimals(mint)?;

        let (expected, bump) = derive_whitelist_address(mint.key, program_id)?;
        if whitelist_account.key != &expected {
            return Err(WhitelistError::InvalidWhitelistAddress.into());
        }
        if whitelist_account.owner == program_id || !whitelist_account.data_is_empty() {
            return Err(WhitelistError::WhitelistAlreadyInitialized.into());
        }
        if vault.key != &vault_address(whitelist_account.key, mint.key, token_program.key) {
            return Err(WhitelistError::IncorrectVaultAddress.into());
        }

        let instance = Clock::get()?.slot;
        let whitelist = Whitelist::from_init(&args, bump, *authority.key, *vault.key, instance)?;

        create_pda_account(
            authority,
            whitelist_account,
            Whitelist::LEN,
            program_id,
            system_program_account,
            &[SEED, mint.key.as_ref(), &[bump]],
        )?;
        whitelist.store(whitelist_account)?;

        msg!("Creating the vault token account...");
        invoke(
            &create_associated_token_account_idempotent(
                authority.key,
                whitelist_account.key,
                mint.key,
                token_program.key,
            ),
            &[
                authority.clone(),
                vault.clone(),
                whitelist_account.clone(),
                mint.clone(),
                system_program_account.clone(),
                token_program.clone(),
                ata_program.clone(),
            ],
        )?;

        Ok(())
    }

    fn process_add_user(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let user = next_account_info(account_info_iter)?;
        let ticket_account = next_account_info(account_info_iter)?;
        let system_program_account = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        check_system_program(system_program_account)?;

        create_ticket(
            &whitelist,
            whitelist_account,
            user.key,
            authority,
            ticket_account,
            system_program_account,
            program_id,
        )
    }

    fn process_remove_user(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let ticket_account = next_account_info(account_info_iter)?;
        let ticket_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        check_vault(&whitelist, vault, mint, token_program)?;

        let ticket = Ticket::load(ticket_account, whitelist_account.key, program_id)?;
        let balance = ticket_token_balance(ticket_token_account, ticket_account, mint, token_program)?;
        let updated = whitelist.credit(ticket.preloaded)?;

        release_ticket(
            &ticket,
            whitelist_account.key,
            ticket_account,
            ticket_token_account,
            balance,
            vault,
            mint,
            token_program,
            authority,
        )?;
        updated.store(whitelist_account)?;

        msg!("Removed ticket for {}", ticket.owner);
        Ok(())
    }

    fn process_amend_whitelist_size(accounts: &[AccountInfo], size: u64, program_id: &Pubkey) -> ProgramResult {
        let (whitelist_account, whitelist) = authority_context(accounts, program_id)?;
        whitelist.with_size(size).store(whitelist_account)
    }

    fn process_amend_times(
        accounts: &[AccountInfo],
        amendment: TimeAmendment,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let (whitelist_account, whitelist) = authority_context(accounts, program_id)?;
        whitelist
            .amend_times(&amendment, now()?)?
            .store(whitelist_account)
    }

    fn process_allow_registration(accounts: &[AccountInfo], allow: bool, program_id: &Pubkey) -> ProgramResult {
        let (whitelist_account, whitelist) = authority_context(accounts, program_id)?;
        whitelist
            .with_registration_allowed(allow)
            .store(whitelist_account)
    }

    fn process_register(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let user = next_account_info(account_info_iter)?;
        let ticket_account = next_account_info(account_info_iter)?;
        let system_program_account = next_account_info(account_info_iter)?;

        if !user.is_signer {
            return Err(WhitelistError::MissingSignature.into());
        }
        check_system_program(system_program_account)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        whitelist.check_registration(now()?)?;

        create_ticket(
            &whitelist,
            whitelist_account,
            user.key,
            user,
            ticket_account,
            system_program_account,
            program_id,
        )
    }

    fn process_unregister(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let user = next_account_info(account_info_iter)?;
        let payer = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let ticket_account = next_account_info(account_info_iter)?;
        let ticket_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        if !user.is_signer {
            return Err(WhitelistError::MissingSignature.into());
        }

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_vault(&whitelist, vault, mint, token_program)?;

        let ticket = Ticket::load(ticket_account, whitelist_account.key, program_id)?;
        ticket.check_unregister(user.key)?;
        if payer.key != &ticket.payer {
            return Err(WhitelistError::IncorrectPayer.into());
        }

        let balance = ticket_token_balance(ticket_token_account, ticket_account, mint, token_program)?;
        let updated = whitelist.credit(ticket.preloaded)?;

        release_ticket(
            &ticket,
            whitelist_account.key,
            ticket_account,
            ticket_token_account,
            balance,
            vault,
            mint,
            token_program,
            payer,
        )?;
        updated.store(whitelist_account)?;

        Ok(())
    }

    fn process_buy(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let buyer = next_account_info(account_info_iter)?;
        let ticket_account = next_account_info(account_info_iter)?;
        let ticket_token_account = next_account_info(account_info_iter)?;
        let buyer_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let system_program_account = next_account_info(account_info_iter)?;
        let ata_program = next_account_info(account_info_iter)?;

        if !buyer.is_signer {
            return Err(WhitelistError::MissingSignature.into());
        }
        check_system_program(system_program_account)?;
        check_ata_program(ata_program)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_vault(&whitelist, vault, mint, token_program)?;

        let ticket = Ticket::load(ticket_account, whitelist_account.key, program_id)?;
        if &ticket.owner != buyer.key {
            return Err(WhitelistError::Unauthorised.into());
        }
        if buyer_token_account.key
            != &spl_associated_token_account::get_associated_token_address_with_program_id(
                buyer.key,
                mint.key,
                token_program.key,
            )
        {
            return Err(ProgramError::InvalidArgument);
        }

        let bought = whitelist.check_buy(&ticket, amount, now()?)?;
        let cost = whitelist.purchase_cost(amount)?;

        check_ticket_token_account(ticket_token_account, ticket_account, mint, token_program)?;
        let source = select_funding_source(ticket.preloaded, amount)?;
        let (updated_ticket, updated_whitelist) = match source {
            FundingSource::Ticket => (bought.draw_preloaded(amount)?, None),
            FundingSource::Vault => {
                if !whitelist_account.is_writable || !vault.is_writable {
                    return Err(ProgramError::InvalidArgument);
                }
                (bought, Some(whitelist.debit(amount)?))
            }
        };

        if cost > 0 {
            msg!("Paying {} lamports for {} tokens", cost, amount);
            invoke(
                &system_instruction::transfer(buyer.key, ticket_account.key, cost),
                &[
                    buyer.clone(),
                    ticket_account.clone(),
                    system_program_account.clone(),
                ],
            )?;
        }

        invoke(
            &create_associated_token_account_idempotent(buyer.key, buyer.key, mint.key, token_program.key),
            &[
                buyer.clone(),
                buyer_token_account.clone(),
                buyer.clone(),
                mint.clone(),
                system_program_account.clone(),
                token_program.clone(),
                ata_program.clone(),
            ],
        )?;

        let decimals = mint_decimals(mint)?;
        match source {
            FundingSource::Ticket => {
                msg!("Calling the token program to release preloaded tokens...");
                transfer_tokens(
                    token_program,
                    ticket_token_account,
                    mint,
                    buyer_token_account,
                    ticket_account,
                    amount,
                    decimals,
                    &[SEED, ticket.owner.as_ref(), whitelist_account.key.as_ref(), &[ticket.bump]],
                )?;
            }
            FundingSource::Vault => {
                msg!("Calling the token program to release vault tokens...");
                transfer_tokens(
                    token_program,
                    vault,
                    mint,
                    buyer_token_account,
                    whitelist_account,
                    amount,
                    decimals,
                    &[SEED, whitelist.mint.as_ref(), &[whitelist.bump]],
                )?;
            }
        }

        updated_ticket.store(ticket_account)?;
        if let Some(updated_whitelist) = updated_whitelist {
            updated_whitelist.store(whitelist_account)?;
        }

        Ok(())
    }

    fn process_deposit_tokens(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let authority_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        check_vault(&whitelist, vault, mint, token_program)?;
        let (updated, accepted) = whitelist.accept_deposit(amount)?;
        if accepted < amount {
            msg!("Deposit trimmed from {} to the {} tokens still needed", amount, accepted);
        }

        let transfer_ix = spl_token_2022::instruction::transfer_checked(
            token_program.key,
            authority_token_account.key,
            mint.key,
            vault.key,
            authority.key,
            &[],
            accepted,
            mint_decimals(mint)?,
        )?;
        msg!("Calling the token program to deposit {} tokens...", accepted);
        invoke(
            &transfer_ix,
            &[
                authority_token_account.clone(),
                mint.clone(),
                vault.clone(),
                authority.clone(),
                token_program.clone(),
            ],
        )?;

        updated.store(whitelist_account)
    }

    fn process_start_registration(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let (whitelist_account, whitelist) = authority_context(accounts, program_id)?;
        whitelist
            .start_registration(now()?)
            .store(whitelist_account)
    }

    fn process_start_token_sale(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let (whitelist_account, whitelist) = authority_context(accounts, program_id)?;
        whitelist.start_sale(now()?).store(whitelist_account)
    }

    fn process_transfer_tokens(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let ticket_account = next_account_info(account_info_iter)?;
        let ticket_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let system_program_account = next_account_info(account_info_iter)?;
        let ata_program = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        check_vault(&whitelist, vault, mint, token_program)?;
        check_system_program(system_program_account)?;
        check_ata_program(ata_program)?;

        let ticket = Ticket::load(ticket_account, whitelist_account.key, program_id)?;
        check_ticket_token_account(ticket_token_account, ticket_account, mint, token_program)?;
        let (updated, loaded) = whitelist.check_preload(&ticket, amount, now()?)?;

        invoke(
            &create_associated_token_account_idempotent(
                authority.key,
                ticket_account.key,
                mint.key,
                token_program.key,
            ),
            &[
                authority.clone(),
                ticket_token_account.clone(),
                ticket_account.clone(),
                mint.clone(),
                system_program_account.clone(),
                token_program.clone(),
                ata_program.clone(),
            ],
        )?;

        msg!("Calling the token program to preload {} tokens...", amount);
        transfer_tokens(
            token_program,
            vault,
            mint,
            ticket_token_account,
            whitelist_account,
            amount,
            mint_decimals(mint)?,
            &[SEED, whitelist.mint.as_ref(), &[whitelist.bump]],
        )?;

        loaded.store(ticket_account)?;
        updated.store(whitelist_account)
    }

    fn process_withdraw_tokens(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let recipient_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        check_vault(&whitelist, vault, mint, token_program)?;
        let updated = whitelist.check_withdraw(amount, now()?)?;

        msg!("Calling the token program to withdraw {} tokens...", amount);
        transfer_tokens(
            token_program,
            vault,
            mint,
            recipient_token_account,
            whitelist_account,
            amount,
            mint_decimals(mint)?,
            &[SEED, whitelist.mint.as_ref(), &[whitelist.bump]],
        )?;

        updated.store(whitelist_account)
    }

    fn process_burn_tickets(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let treasury = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        if treasury.key != &whitelist.treasury {
            return Err(WhitelistError::IncorrectTreasury.into());
        }
        check_vault(&whitelist, vault, mint, token_program)?;
        whitelist.check_burn(now()?)?;

        let pairs = account_info_iter.as_slice();
        if pairs.is_empty() {
            return Err(WhitelistError::NoTickets.into());
        }
        if pairs.len() % 2 != 0 {
            return Err(ProgramError::NotEnoughAccountKeys);
        }

        let mut updated = whitelist;
        let mut burns = Vec::with_capacity(pairs.len() / 2);
        for (index, pair) in pairs.chunks_exact(2).enumerate() {
            let (ticket_account, ticket_token_account) = (&pair[0], &pair[1]);
            if pairs[..index * 2]
                .chunks_exact(2)
                .any(|seen| seen[0].key == ticket_account.key)
            {
                return Err(ProgramError::InvalidArgument);
            }
            let ticket = Ticket::load(ticket_account, whitelist_account.key, program_id)?;
            let balance = ticket_token_balance(ticket_token_account, ticket_account, mint, token_program)?;
            updated = updated.credit(ticket.preloaded)?;
            burns.push((ticket, ticket_account, ticket_token_account, balance));
        }

        for (ticket, ticket_account, ticket_token_account, balance) in burns.iter() {
            release_ticket(
                ticket,
                whitelist_account.key,
                ticket_account,
                ticket_token_account,
                *balance,
                vault,
                mint,
                token_program,
                treasury,
            )?;
        }
        updated.store(whitelist_account)?;

        msg!("Burned {} tickets", burns.len());
        Ok(())
    }

    fn process_terminate_whitelist(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let vault = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let recipient = next_account_info(account_info_iter)?;
        let recipient_token_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        check_vault(&whitelist, vault, mint, token_program)?;
        whitelist.check_terminate(now()?)?;

        let remaining = token_balance(vault)?;
        let bump = [whitelist.bump];
        let signer_seeds: &[&[u8]] = &[SEED, whitelist.mint.as_ref(), &bump];

        if remaining > 0 {
            msg!("Calling the token program to return {} unsold tokens...", remaining);
            transfer_tokens(
                token_program,
                vault,
                mint,
                recipient_token_account,
                whitelist_account,
                remaining,
                mint_decimals(mint)?,
                signer_seeds,
            )?;
        }

        msg!("Calling the token program to close the vault...");
        close_token_account(token_program, vault, recipient, whitelist_account, signer_seeds)?;

        msg!("Closing the whitelist account...");
        close_program_account(whitelist_account, recipient)
    }

    fn process_withdraw_sol(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let whitelist_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let recipient = next_account_info(account_info_iter)?;

        let whitelist = Whitelist::load(whitelist_account, program_id)?;
        check_authority(&whitelist, authority)?;
        if amount == 0 {
            return Err(WhitelistError::InvalidAmount.into());
        }

        let reserved = Rent::get()?.minimum_balance(whitelist_account.data_len());
        let available = whitelist_account.lamports().saturating_sub(reserved);
        if amount > available {
            return Err(WhitelistError::InsufficientLamports.into());
        }

        **whitelist_account.try_borrow_mut_lamports()? = whitelist_account
            .lamports()
            .checked_sub(amount)
            .ok_or(WhitelistError::InsufficientFunds)?;
        **recipient.try_borrow_mut_lamports()? = recipient
            .lamports()
            .checked_add(amount)
            .ok_or(WhitelistError::Overflow)?;

        msg!("Withdrew {} lamports", amount);
        Ok(())
    }
}

fn now() -> Result<i64, ProgramError> {
    Ok(Clock::get()?.unix_timestamp)
}

/// Loads the whitelist for the two-account authority instructions.
fn authority_context<'a, 'b>(
    accounts: &'a [AccountInfo<'b>],
    program_id: &Pubkey,
) -> Result<(&'a AccountInfo<'b>, Whitelist), ProgramError> {
    let account_info_iter = &mut accounts.iter();
    let whitelist_account = next_account_info(account_info_iter)?;
    let authority = next_account_info(account_info_iter)?;

    let whitelist = Whitelist::load(whitelist_account, program_id)?;
    check_authority(&whitelist, authority)?;
    Ok((whitelist_account, whitelist))
}

fn check_authority(whitelist: &Whitelist, authority: &AccountInfo) -> ProgramResult {
    if !authority.is_signer {
        return Err(WhitelistError::MissingSignature.into());
    }
    if authority.key != &whitelist.authority {
        return Err(WhitelistError::Unauthorised.into());
    }
    Ok(())
}

/// The vault must be the one recorded at init, holding the whitelist's mint
/// under the supplied token program.
fn check_vault(
    whitelist: &Whitelist,
    vault: &AccountInfo,
    mint: &AccountInfo,
    token_program: &AccountInfo,
) -> ProgramResult {
    spl_token_2022::check_spl_token_program_account(token_program.key)?;
    if mint.key != &whitelist.mint {
        return Err(WhitelistError::IncorrectMintAddress.into());
    }
    if vault.key != &whitelist.vault {
        return Err(WhitelistError::IncorrectVaultAddress.into());
    }
    if vault.owner != token_program.key || mint.owner != token_program.key {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

fn check_system_program(account: &AccountInfo) -> ProgramResult {
    if !system_program::check_id(account.key) {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

fn check_ata_program(account: &AccountInfo) -> ProgramResult {
    if !spl_associated_token_account::check_id(account.key) {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

fn mint_decimals(mint: &AccountInfo) -> Result<u8, ProgramError> {
    let data = mint.try_borrow_data()?;
    Ok(StateWithExtensions::<Mint>::unpack(&data)?.base.decimals)
}

/// Balance of a token account, or 0 if it has not been created yet.
fn token_balance(account: &AccountInfo) -> Result<u64, ProgramError> {
    if account.data_is_empty() {
        return Ok(0);
    }
    let data = account.try_borrow_data()?;
    Ok(StateWithExtensions::<TokenAccount>::unpack(&data)?.base.amount)
}

/// The token account must be the ticket's associated one.
fn check_ticket_token_account(
    ticket_token_account: &AccountInfo,
    ticket_account: &AccountInfo,
    mint: &AccountInfo,
    token_program: &AccountInfo,
) -> ProgramResult {
    if ticket_token_account.key != &ticket_token_address(ticket_account.key, mint.key, token_program.key) {
        return Err(WhitelistError::IncorrectTicketTokenAddress.into());
    }
    if !ticket_token_account.data_is_empty() && ticket_token_account.owner != token_program.key {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Raw balance of a ticket's token account. This can exceed the ticket's
/// `preloaded` figure when someone sends tokens to the account directly.
fn ticket_token_balance(
    ticket_token_account: &AccountInfo,
    ticket_account: &AccountInfo,
    mint: &AccountInfo,
    token_program: &AccountInfo,
) -> Result<u64, ProgramError> {
    check_ticket_token_account(ticket_token_account, ticket_account, mint, token_program)?;
    token_balance(ticket_token_account)
}

fn create_ticket<'a>(
    whitelist: &Whitelist,
    whitelist_account: &AccountInfo<'a>,
    owner: &Pubkey,
    payer: &AccountInfo<'a>,
    ticket_account: &AccountInfo<'a>,
    system_program_account: &AccountInfo<'a>,
    program_id: &Pubkey,
) -> ProgramResult {
    let (expected, bump) = derive_ticket_address(owner, whitelist_account.key, program_id)?;
    if ticket_account.key != &expected {
        return Err(WhitelistError::InvalidTicketAddress.into());
    }
    if ticket_account.owner == program_id || !ticket_account.data_is_empty() {
        return Err(WhitelistError::TicketAlreadyExists.into());
    }

    let ticket = whitelist.issue_ticket(*whitelist_account.key, *owner, *payer.key, bump);
    create_pda_account(
        payer,
        ticket_account,
        Ticket::LEN,
        program_id,
        system_program_account,
        &[SEED, owner.as_ref(), whitelist_account.key.as_ref(), &[bump]],
    )?;
    ticket.store(ticket_account)?;

    msg!("Issued ticket for {} with allowance {}", owner, ticket.allowance);
    Ok(())
}

/// Creates a program-owned account at a derived address. Lamports already
/// sitting at the address are kept and topped up rather than failing the
/// `create_account` call.
fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    target: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    system_program_account: &AccountInfo<'a>,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let required = Rent::get()?.minimum_balance(space);

    if target.lamports() == 0 {
        return invoke_signed(
            &system_instruction::create_account(payer.key, target.key, required, space as u64, owner),
            &[payer.clone(), target.clone(), system_program_account.clone()],
            &[signer_seeds],
        );
    }

    let shortfall = required.saturating_sub(target.lamports());
    if shortfall > 0 {
        invoke(
            &system_instruction::transfer(payer.key, target.key, shortfall),
            &[payer.clone(), target.clone(), system_program_account.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(target.key, space as u64),
        &[target.clone(), system_program_account.clone()],
        &[signer_seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(target.key, owner),
        &[target.clone(), system_program_account.clone()],
        &[signer_seeds],
    )
}

#[allow(clippy::too_many_arguments)]
fn transfer_tokens<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
    decimals: u8,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let transfer_ix = spl_token_2022::instruction::transfer_checked(
        token_program.key,
        source.key,
        mint.key,
        destination.key,
        authority.key,
        &[],
        amount,
        decimals,
    )?;
    invoke_signed(
        &transfer_ix,
        &[
            source.clone(),
            mint.clone(),
            destination.clone(),
            authority.clone(),
            token_program.clone(),
        ],
        &[signer_seeds],
    )
}

fn close_token_account<'a>(
    token_program: &AccountInfo<'a>,
    account: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let close_ix = spl_token_2022::instruction::close_account(
        token_program.key,
        account.key,
        destination.key,
        authority.key,
        &[],
    )?;
    invoke_signed(
        &close_ix,
        &[
            account.clone(),
            destination.clone(),
            authority.clone(),
            token_program.clone(),
        ],
        &[signer_seeds],
    )
}

/// Drains `account` into `destination` and hands it back to the system
/// program with no data.
fn close_program_account(account: &AccountInfo, destination: &AccountInfo) -> ProgramResult {
    **destination.try_borrow_mut_lamports()? = destination
        .lamports()
        .checked_add(account.lamports())
        .ok_or(WhitelistError::Overflow)?;
    **account.try_borrow_mut_lamports()? = 0;

    account.try_borrow_mut_data()?.fill(0);
    account.realloc(0, false)?;
    account.assign(&system_program::id());
    Ok(())
}

/// Sweeps the whole `balance` of a ticket's token account to the vault, then
/// closes the token account and the ticket itself into `destination`.
#[allow(clippy::too_many_arguments)]
fn release_ticket<'a>(
    ticket: &Ticket,
    whitelist_key: &Pubkey,
    ticket_account: &AccountInfo<'a>,
    ticket_token_account: &AccountInfo<'a>,
    balance: u64,
    vault: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    token_program: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
) -> ProgramResult {
    let bump = [ticket.bump];
    let signer_seeds: &[&[u8]] = &[SEED, ticket.owner.as_ref(), whitelist_key.as_ref(), &bump];

    if !ticket_token_account.data_is_empty() {
        if balance > 0 {
            transfer_tokens(
                token_program,
                ticket_token_account,
                mint,
                vault,
                ticket_account,
                balance,
                mint_decimals(mint)?,
                signer_seeds,
            )?;
        }
        close_token_account(
            token_program,
            ticket_token_account,
            destination,
            ticket_account,
            signer_seeds,
        )?;
    }

    close_program_account(ticket_account, destination)
}
