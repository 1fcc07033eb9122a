//! Whitelist-gated token sale.
//!
//! A whitelist record per mint holds the sale parameters and phase times;
//! registered users hold a ticket derived from their key and the whitelist,
//! and buy against it during the sale window.

pub mod contention;
pub mod error;
pub mod instruction;
pub mod pda;
pub mod phase;
pub mod processor;
pub mod query;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

solana_program::declare_id!("25GbKR2rnvaotoD2nLQN4FziXbJKpfLmezQTfML5Daoo");

/// Leading seed of every address the program derives.
pub const SEED: &[u8] = b"___whitelist";
