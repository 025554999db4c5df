use pinocchio::{
    account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey, sysvars::clock::Epoch,
};
use pinocchio_pubkey::pubkey;

pub const VOTE_PROGRAM_ID: Pubkey = pubkey!("Vote111111111111111111111111111111111111111");

/// The minimum number of epochs a vote account must be delinquent before a
/// stake delegated to it may be deactivated by a third party
pub const MINIMUM_DELINQUENT_EPOCHS_FOR_DEACTIVATION: usize = 5;

// vote state serialization, shared prefix:
//   version word, node pubkey, withdraw authority, commission
const VERSION_SIZE: usize = 4;
const VOTES_LEN_OFFSET: usize = VERSION_SIZE + 32 + 32 + 1;

// vote record size by version: a bare lockout (slot, confirmation count) or
// a landed vote carrying a one-byte latency in front
const LOCKOUT_SIZE: usize = 12;
const LANDED_VOTE_SIZE: usize = 13;

// authorized voter record: epoch plus pubkey
const AUTHORIZED_VOTER_SIZE: usize = 40;

// prior voters circular buffer: 32 records of (pubkey, epoch, epoch), the
// cursor word, and the is-empty flag
const PRIOR_VOTERS_SIZE: usize = 32 * 48 + 8 + 1;

// epoch credits record: (epoch, credits, prev credits)
const EPOCH_CREDITS_ENTRY_SIZE: usize = 24;

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ProgramError> {
    let end = offset.checked_add(8).ok_or(ProgramError::InvalidAccountData)?;
    let bytes = data.get(offset..end).ok_or(ProgramError::InvalidAccountData)?;
    Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u8(data: &[u8], offset: usize) -> Result<u8, ProgramError> {
    data.get(offset)
        .copied()
        .ok_or(ProgramError::InvalidAccountData)
}

/// Walk the serialized vote state to the epoch-credits vector and return
/// `(first record offset, record count)`.
///
/// The layout is versioned; only the two versions observable on a live
/// cluster are accepted. Everything before the epoch credits is fixed-size
/// or length-prefixed, so the walk is a handful of bounded reads and no
/// allocation.
pub(crate) fn locate_epoch_credits(data: &[u8]) -> Result<(usize, usize), ProgramError> {
    let version = u32::from_le_bytes(
        data.get(0..4)
            .ok_or(ProgramError::InvalidAccountData)?
            .try_into()
            .unwrap(),
    );
    let vote_size = match version {
        1 => LOCKOUT_SIZE,      // pre-timely-vote-credits layout
        2 => LANDED_VOTE_SIZE,  // current layout
        _ => return Err(ProgramError::InvalidAccountData),
    };

    let votes_len = read_u64(data, VOTES_LEN_OFFSET)? as usize;
    let mut cursor = VOTES_LEN_OFFSET
        .checked_add(8)
        .and_then(|c| c.checked_add(votes_len.checked_mul(vote_size)?))
        .ok_or(ProgramError::InvalidAccountData)?;

    // root slot option
    cursor += match read_u8(data, cursor)? {
        0 => 1,
        1 => 9,
        _ => return Err(ProgramError::InvalidAccountData),
    };

    let authorized_voters_len = read_u64(data, cursor)? as usize;
    cursor = cursor
        .checked_add(8)
        .and_then(|c| c.checked_add(authorized_voters_len.checked_mul(AUTHORIZED_VOTER_SIZE)?))
        .and_then(|c| c.checked_add(PRIOR_VOTERS_SIZE))
        .ok_or(ProgramError::InvalidAccountData)?;

    let epoch_credits_len = read_u64(data, cursor)? as usize;
    let first = cursor + 8;

    // the whole vector must be inside the account data
    let end = epoch_credits_len
        .checked_mul(EPOCH_CREDITS_ENTRY_SIZE)
        .and_then(|len| first.checked_add(len))
        .ok_or(ProgramError::InvalidAccountData)?;
    if end > data.len() {
        return Err(ProgramError::InvalidAccountData);
    }

    Ok((first, epoch_credits_len))
}

fn epoch_credits_entry(
    data: &[u8],
    first: usize,
    index: usize,
) -> Result<(Epoch, u64, u64), ProgramError> {
    let base = first + index * EPOCH_CREDITS_ENTRY_SIZE;
    Ok((
        read_u64(data, base)?,
        read_u64(data, base + 8)?,
        read_u64(data, base + 16)?,
    ))
}

fn check_vote_account(vote_account_info: &AccountInfo) -> Result<(), ProgramError> {
    if !vote_account_info.is_owned_by(&VOTE_PROGRAM_ID) {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Credits observed by the vote account as of its latest credited epoch.
pub fn get_credits(vote_account_info: &AccountInfo) -> Result<u64, ProgramError> {
    check_vote_account(vote_account_info)?;
    let data = vote_account_info.try_borrow_data()?;
    let (first, len) = locate_epoch_credits(&data)?;
    if len == 0 {
        Ok(0)
    } else {
        let (_, credits, _) = epoch_credits_entry(&data, first, len - 1)?;
        Ok(credits)
    }
}

/// The most recent epoch the vote account earned credits in, `None` if it
/// never voted.
pub fn get_last_epoch(vote_account_info: &AccountInfo) -> Result<Option<Epoch>, ProgramError> {
    check_vote_account(vote_account_info)?;
    let data = vote_account_info.try_borrow_data()?;
    let (first, len) = locate_epoch_credits(&data)?;
    if len == 0 {
        Ok(None)
    } else {
        let (epoch, _, _) = epoch_credits_entry(&data, first, len - 1)?;
        Ok(Some(epoch))
    }
}

/// Whether the vote account earned credits in each of the last
/// `MINIMUM_DELINQUENT_EPOCHS_FOR_DEACTIVATION` epochs, current included —
/// the bar a reference vote account must clear.
pub fn acceptable_reference_epoch_credits(
    vote_account_info: &AccountInfo,
    current_epoch: Epoch,
) -> Result<bool, ProgramError> {
    check_vote_account(vote_account_info)?;
    let data = vote_account_info.try_borrow_data()?;
    let (first, len) = locate_epoch_credits(&data)?;
    epoch_credits_are_consecutive(&data, first, len, current_epoch)
}

fn epoch_credits_are_consecutive(
    data: &[u8],
    first: usize,
    len: usize,
    current_epoch: Epoch,
) -> Result<bool, ProgramError> {
    let Some(oldest_index) = len.checked_sub(MINIMUM_DELINQUENT_EPOCHS_FOR_DEACTIVATION) else {
        return Ok(false);
    };

    let mut expected_epoch = current_epoch;
    for index in (oldest_index..len).rev() {
        let (epoch, _, _) = epoch_credits_entry(data, first, index)?;
        if epoch != expected_epoch {
            return Ok(false);
        }
        expected_epoch = expected_epoch.saturating_sub(1);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serialize a vote-state buffer the way the vote program lays it out,
    /// with the given epoch credits at the tail of the walk.
    fn serialize_vote_state(
        version: u32,
        votes: usize,
        has_root: bool,
        epoch_credits: &[(u64, u64, u64)],
    ) -> Vec<u8> {
        let vote_size = if version == 1 { LOCKOUT_SIZE } else { LANDED_VOTE_SIZE };
        let mut data = Vec::new();
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(&[1; 32]); // node pubkey
        data.extend_from_slice(&[2; 32]); // withdraw authority
        data.push(50); // commission
        data.extend_from_slice(&(votes as u64).to_le_bytes());
        data.extend_from_slice(&vec![0; votes * vote_size]);
        if has_root {
            data.push(1);
            data.extend_from_slice(&77u64.to_le_bytes());
        } else {
            data.push(0);
        }
        data.extend_from_slice(&1u64.to_le_bytes()); // one authorized voter
        data.extend_from_slice(&vec![0; AUTHORIZED_VOTER_SIZE]);
        data.extend_from_slice(&vec![0; PRIOR_VOTERS_SIZE]);
        data.extend_from_slice(&(epoch_credits.len() as u64).to_le_bytes());
        for (epoch, credits, prev_credits) in epoch_credits {
            data.extend_from_slice(&epoch.to_le_bytes());
            data.extend_from_slice(&credits.to_le_bytes());
            data.extend_from_slice(&prev_credits.to_le_bytes());
        }
        data.extend_from_slice(&[0; 16]); // last timestamp
        data
    }

    fn credits_of(data: &[u8]) -> Vec<(u64, u64, u64)> {
        let (first, len) = locate_epoch_credits(data).unwrap();
        (0..len)
            .map(|i| epoch_credits_entry(data, first, i).unwrap())
            .collect()
    }

    #[test]
    fn walks_both_live_layouts() {
        let entries = [(7u64, 100u64, 50u64), (8, 200, 100)];
        for version in [1u32, 2] {
            for votes in [0usize, 3, 31] {
                for has_root in [false, true] {
                    let data = serialize_vote_state(version, votes, has_root, &entries);
                    assert_eq!(credits_of(&data), entries.to_vec());
                }
            }
        }
    }

    #[test]
    fn rejects_ancient_and_unknown_versions() {
        for version in [0u32, 3, 99] {
            let data = serialize_vote_state(version, 0, false, &[]);
            assert_eq!(
                locate_epoch_credits(&data),
                Err(ProgramError::InvalidAccountData)
            );
        }
    }

    #[test]
    fn rejects_truncated_data() {
        let data = serialize_vote_state(2, 2, true, &[(7, 100, 50)]);
        for cut in [3, VOTES_LEN_OFFSET + 4, data.len() - 20] {
            assert!(locate_epoch_credits(&data[..cut]).is_err());
        }
    }

    #[test]
    fn reference_must_vote_every_recent_epoch() {
        // five consecutive epochs ending at the current epoch pass
        let entries: Vec<_> = (6..=10).map(|e| (e, e * 10, e * 10 - 10)).collect();
        let data = serialize_vote_state(2, 0, false, &entries);
        let (first, len) = locate_epoch_credits(&data).unwrap();
        assert!(epoch_credits_are_consecutive(&data, first, len, 10).unwrap());

        // stale by one epoch fails
        assert!(!epoch_credits_are_consecutive(&data, first, len, 11).unwrap());

        // too short a history fails
        let entries: Vec<_> = (7..=10).map(|e| (e, e * 10, e * 10 - 10)).collect();
        let data = serialize_vote_state(2, 0, false, &entries);
        let (first, len) = locate_epoch_credits(&data).unwrap();
        assert!(!epoch_credits_are_consecutive(&data, first, len, 10).unwrap());

        // a gap inside the window fails
        let entries = [(6u64, 1u64, 0u64), (7, 2, 1), (8, 3, 2), (9, 4, 3), (11, 5, 4)];
        let data = serialize_vote_state(2, 0, false, &entries);
        let (first, len) = locate_epoch_credits(&data).unwrap();
        assert!(!epoch_credits_are_consecutive(&data, first, len, 11).unwrap());
    }
}
