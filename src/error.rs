use num_derive::FromPrimitive;
use num_traits::FromPrimitive as FromPrimitiveTrait;
use thiserror::Error;

use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};

/// Coarse classification every `WhitelistError` falls into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed instruction or account bytes
    Decode,
    /// A supplied address does not match its recomputed derivation
    DerivationMismatch,
    /// Missing signer or identity mismatch
    Authorization,
    /// A phase guard rejected the transition
    StateViolation,
    /// A counter would overflow or underflow
    Arithmetic,
}

#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum WhitelistError {
    /// Unknown opcode
    #[error("Invalid Instruction")]
    InvalidInstruction,
    /// Payload shorter or longer than the opcode requires
    #[error("Invalid Instruction Length")]
    InvalidInstructionLength,
    /// Boolean byte other than 0 or 1
    #[error("Invalid Boolean Encoding")]
    InvalidBool,
    /// AmendTimes presence byte with unknown bits set
    #[error("Invalid Time Field Mask")]
    InvalidTimeMask,
    /// Account data length or contents do not match the record layout
    #[error("Invalid Account Data")]
    InvalidAccountData,

    #[error("Invalid Whitelist Address")]
    InvalidWhitelistAddress,
    #[error("Invalid Ticket Address")]
    InvalidTicketAddress,
    #[error("Incorrect Vault Address")]
    IncorrectVaultAddress,
    #[error("Incorrect Ticket Token Account Address")]
    IncorrectTicketTokenAddress,
    /// No bump in 255..=0 produced an off-curve address
    #[error("Address Derivation Exhausted")]
    DerivationExhausted,

    #[error("Missing Required Signature")]
    MissingSignature,
    #[error("Unauthorised Access")]
    Unauthorised,
    #[error("Incorrect Payer")]
    IncorrectPayer,
    #[error("Incorrect Mint Address")]
    IncorrectMintAddress,
    #[error("Incorrect Treasury Address")]
    IncorrectTreasury,
    #[error("Illegal Mint Owner")]
    IllegalMintOwner,

    #[error("Whitelist Already Initialized")]
    WhitelistAlreadyInitialized,
    #[error("Whitelist Not Initialized")]
    WhitelistNotInitialized,
    #[error("Ticket Already Exists")]
    TicketAlreadyExists,
    #[error("Ticket Not Found")]
    TicketNotFound,
    #[error("Whitelist Is Full")]
    WhitelistFull,
    #[error("Registration Is Not Allowed")]
    RegistrationNotAllowed,
    #[error("Registration Has Not Started")]
    RegistrationNotStarted,
    #[error("Registration Has Finished")]
    RegistrationFinished,
    #[error("Sale Has Not Started")]
    SaleNotStarted,
    #[error("Sale Has Started")]
    SaleStarted,
    #[error("Sale Has Ended")]
    SaleEnded,
    #[error("Sale Has Not Ended")]
    SaleNotEnded,
    /// Attempt to amend a time field whose current value has already passed
    #[error("Time Field Has Elapsed")]
    TimeElapsed,
    #[error("Invalid Times")]
    InvalidTimes,
    #[error("Invalid Amount")]
    InvalidAmount,
    #[error("Buy Limit Exceeded")]
    BuyLimitExceeded,
    #[error("Ticket Has Purchases")]
    TicketHasPurchases,
    #[error("Insufficient Ticket Balance")]
    InsufficientTicketBalance,
    #[error("Insufficient Lamports")]
    InsufficientLamports,
    #[error("No Tickets Supplied")]
    NoTickets,
    #[error("Ticket Belongs To An Earlier Whitelist")]
    StaleTicket,
    #[error("Deposit Cap Reached")]
    DepositCapReached,

    #[error("Overflow")]
    Overflow,
    #[error("Insufficient Funds")]
    InsufficientFunds,
}

impl WhitelistError {
    pub fn kind(&self) -> ErrorKind {
        use WhitelistError::*;

        match self {
            InvalidInstruction | InvalidInstructionLength | InvalidBool | InvalidTimeMask
            | InvalidAccountData => ErrorKind::Decode,
            InvalidWhitelistAddress
            | InvalidTicketAddress
            | IncorrectVaultAddress
            | IncorrectTicketTokenAddress
            | DerivationExhausted => ErrorKind::DerivationMismatch,
            MissingSignature | Unauthorised | IncorrectPayer | IncorrectMintAddress
            | IncorrectTreasury | IllegalMintOwner => ErrorKind::Authorization,
            Overflow | InsufficientFunds => ErrorKind::Arithmetic,
            _ => ErrorKind::StateViolation,
        }
    }
}

impl From<WhitelistError> for ProgramError {
    fn from(e: WhitelistError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for WhitelistError {
    fn type_of() -> &'static str {
        "WhitelistError"
    }
}

impl PrintProgramError for WhitelistError {
    fn print<E>(&self)
    where
        E: 'static + std::error::Error + DecodeError<E> + PrintProgramError + FromPrimitiveTrait,
    {
        msg!("Error: {}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_codes_round_trip() {
        let err = WhitelistError::BuyLimitExceeded;
        let code = match ProgramError::from(err) {
            ProgramError::Custom(code) => code,
            other => panic!("unexpected error {:?}", other),
        };
        assert_eq!(WhitelistError::from_u32(code), Some(err));
    }

    #[test]
    fn taxonomy() {
        assert_eq!(WhitelistError::InvalidInstruction.kind(), ErrorKind::Decode);
        assert_eq!(
            WhitelistError::InvalidTicketAddress.kind(),
            ErrorKind::DerivationMismatch
        );
        assert_eq!(WhitelistError::Unauthorised.kind(), ErrorKind::Authorization);
        assert_eq!(WhitelistError::SaleNotEnded.kind(), ErrorKind::StateViolation);
        assert_eq!(WhitelistError::StaleTicket.kind(), ErrorKind::StateViolation);
        assert_eq!(WhitelistError::Overflow.kind(), ErrorKind::Arithmetic);
    }
}
