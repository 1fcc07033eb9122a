//! Client-side helpers over raw program accounts.
//!
//! The program keeps no registration counter, so population is worked out by
//! enumerating the program's accounts (for example through a
//! `getProgramAccounts` call filtered on [`TICKET_WHITELIST_OFFSET`]) and
//! checked here before `AddUser`, `Register` or `AmendWhitelistSize` is sent.

use solana_program::{program_pack::Pack, pubkey::Pubkey};

use crate::{
    error::WhitelistError,
    state::{Ticket, Whitelist},
};

/// Byte offset of the whitelist back-reference inside a ticket record.
pub const TICKET_WHITELIST_OFFSET: usize = 1;

/// Memcmp filter `(offset, bytes)` selecting the tickets of `whitelist`.
pub fn ticket_filter(whitelist: &Pubkey) -> (usize, [u8; 32]) {
    (TICKET_WHITELIST_OFFSET, whitelist.to_bytes())
}

/// Keeps the accounts that decode as a canonical ticket of the whitelist at
/// `whitelist` whose current record is `record`. Whitelist records, foreign
/// tickets, tickets left over from an earlier instance and anything at a
/// non-derived address are skipped.
pub fn tickets_for_whitelist<'a, I>(
    whitelist: &Pubkey,
    record: &Whitelist,
    accounts: I,
    program_id: &Pubkey,
) -> Vec<(Pubkey, Ticket)>
where
    I: IntoIterator<Item = (&'a Pubkey, &'a [u8])>,
{
    accounts
        .into_iter()
        .filter(|(_, data)| data.len() == Ticket::LEN)
        .filter_map(|(address, data)| {
            let ticket = Ticket::unpack(data).ok()?;
            record.check_ticket(&ticket).ok()?;
            ticket
                .verify_address(address, whitelist, program_id)
                .ok()
                .map(|_| (*address, ticket))
        })
        .collect()
}

pub fn population<'a, I>(
    whitelist: &Pubkey,
    record: &Whitelist,
    accounts: I,
    program_id: &Pubkey,
) -> u64
where
    I: IntoIterator<Item = (&'a Pubkey, &'a [u8])>,
{
    tickets_for_whitelist(whitelist, record, accounts, program_id).len() as u64
}

/// Fails once the registered population has reached `whitelist_size`.
pub fn check_capacity(whitelist: &Whitelist, population: u64) -> Result<(), WhitelistError> {
    if population >= whitelist.whitelist_size {
        return Err(WhitelistError::WhitelistFull);
    }
    Ok(())
}

/// A resize below the current population would strand registered users.
pub fn check_resize(population: u64, size: u64) -> Result<(), WhitelistError> {
    if size < population {
        return Err(WhitelistError::WhitelistFull);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pda::{derive_ticket_address, derive_whitelist_address};

    fn record() -> Whitelist {
        Whitelist {
            buy_limit: 500,
            whitelist_size: 10,
            instance: 3,
            ..Whitelist::default()
        }
    }

    fn packed_ticket(owner: Pubkey, whitelist: Pubkey, program_id: &Pubkey) -> (Pubkey, Vec<u8>) {
        let (address, bump) = derive_ticket_address(&owner, &whitelist, program_id).unwrap();
        let ticket = record().issue_ticket(whitelist, owner, owner, bump);
        let mut data = vec![0u8; Ticket::LEN];
        Ticket::pack(ticket, &mut data).unwrap();
        (address, data)
    }

    #[test]
    fn filters_tickets_of_one_whitelist() {
        let program_id = Pubkey::new_unique();
        let (whitelist, _) = derive_whitelist_address(&Pubkey::new_unique(), &program_id).unwrap();
        let (other, _) = derive_whitelist_address(&Pubkey::new_unique(), &program_id).unwrap();

        let mine: Vec<_> = (0..3)
            .map(|_| packed_ticket(Pubkey::new_unique(), whitelist, &program_id))
            .collect();
        let foreign = packed_ticket(Pubkey::new_unique(), other, &program_id);
        let (_, misplaced) = packed_ticket(Pubkey::new_unique(), whitelist, &program_id);
        let misplaced_address = Pubkey::new_unique();
        let whitelist_record = vec![0u8; Whitelist::LEN];

        let stale_owner = Pubkey::new_unique();
        let (stale_address, bump) = derive_ticket_address(&stale_owner, &whitelist, &program_id).unwrap();
        let earlier = Whitelist {
            instance: 2,
            ..record()
        };
        let mut stale = vec![0u8; Ticket::LEN];
        Ticket::pack(earlier.issue_ticket(whitelist, stale_owner, stale_owner, bump), &mut stale).unwrap();

        let mut accounts: Vec<(&Pubkey, &[u8])> = mine
            .iter()
            .map(|(address, data)| (address, data.as_slice()))
            .collect();
        accounts.push((&foreign.0, foreign.1.as_slice()));
        accounts.push((&misplaced_address, misplaced.as_slice()));
        accounts.push((&whitelist, whitelist_record.as_slice()));
        accounts.push((&stale_address, stale.as_slice()));

        let found = tickets_for_whitelist(&whitelist, &record(), accounts.clone(), &program_id);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|(_, ticket)| ticket.whitelist == whitelist));
        assert_eq!(population(&whitelist, &record(), accounts, &program_id), 3);
    }

    #[test]
    fn filter_matches_record_offset() {
        let program_id = Pubkey::new_unique();
        let whitelist = Pubkey::new_unique();
        let (_, data) = packed_ticket(Pubkey::new_unique(), whitelist, &program_id);
        let (offset, bytes) = ticket_filter(&whitelist);

        assert_eq!(&data[offset..offset + 32], &bytes);
    }

    #[test]
    fn capacity() {
        let whitelist = Whitelist {
            whitelist_size: 2,
            ..Whitelist::default()
        };

        assert!(check_capacity(&whitelist, 1).is_ok());
        assert_eq!(check_capacity(&whitelist, 2), Err(WhitelistError::WhitelistFull));
        assert!(check_resize(2, 2).is_ok());
        assert_eq!(check_resize(3, 2), Err(WhitelistError::WhitelistFull));
    }
}
