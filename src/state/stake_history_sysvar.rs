use pinocchio::sysvars::clock::Epoch;

use crate::pinocchio_add::sysvar::get_sysvar_unchecked;

use super::stake_history::{
    StakeHistoryEntry, StakeHistoryGetEntry, ENTRY_SERIALIZED_SIZE, LEN_PREFIX_SIZE, MAX_ENTRIES,
    STAKE_HISTORY_ID,
};

/// Lazy per-entry stake history reads through the `sol_get_sysvar` syscall,
/// for processors whose wire format does not bind the sysvar account.
///
/// Carries the current epoch so offsets can be computed without first
/// pulling the entry count.
#[derive(Debug, PartialEq)]
pub struct StakeHistorySysvar(pub Epoch);

fn read_record(index: u64) -> Option<(Epoch, StakeHistoryEntry)> {
    let offset = index
        .checked_mul(ENTRY_SERIALIZED_SIZE as u64)?
        .checked_add(LEN_PREFIX_SIZE as u64)?;

    let mut record_buf = [0u8; ENTRY_SERIALIZED_SIZE];
    // SAFETY: the buffer is exactly one serialized record
    let result = unsafe {
        get_sysvar_unchecked(
            &mut record_buf,
            &STAKE_HISTORY_ID,
            offset,
            ENTRY_SERIALIZED_SIZE as u64,
        )
    };
    if result.is_err() {
        return None;
    }

    let word = |i: usize| u64::from_le_bytes(record_buf[i * 8..i * 8 + 8].try_into().unwrap());
    Some((
        word(0),
        StakeHistoryEntry {
            effective: word(1),
            activating: word(2),
            deactivating: word(3),
        },
    ))
}

fn read_entry_count() -> Option<u64> {
    let mut len_buf = [0u8; LEN_PREFIX_SIZE];
    // SAFETY: the buffer is exactly the count prefix
    let result =
        unsafe { get_sysvar_unchecked(&mut len_buf, &STAKE_HISTORY_ID, 0, LEN_PREFIX_SIZE as u64) };
    if result.is_err() {
        return None;
    }
    Some(u64::from_le_bytes(len_buf).min(MAX_ENTRIES as u64))
}

/// Descending binary search over the serialized records, one syscall read
/// per probe. Only reached when a slot held an unexpected epoch.
fn binary_search(target_epoch: Epoch) -> Option<StakeHistoryEntry> {
    let mut lo = 0u64;
    let mut hi = read_entry_count()?;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (mid_epoch, entry) = read_record(mid)?;
        if mid_epoch == target_epoch {
            return Some(entry);
        } else if mid_epoch < target_epoch {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    None
}

impl StakeHistoryGetEntry for StakeHistorySysvar {
    fn get_entry(&self, target_epoch: Epoch) -> Option<StakeHistoryEntry> {
        let current_epoch = self.0;

        // if current epoch is zero this returns None because there is no
        // history yet
        let newest_historical_epoch = current_epoch.checked_sub(1)?;
        let oldest_historical_epoch = current_epoch.saturating_sub(MAX_ENTRIES as u64);

        // target epoch is old enough to have fallen off history; presume
        // fully active/deactive
        if target_epoch < oldest_historical_epoch {
            return None;
        }

        // epoch delta is how many records we offset into the history; None
        // means target epoch is current or in the future, a user error
        let epoch_delta = newest_historical_epoch.checked_sub(target_epoch)?;

        let (record_epoch, entry) = read_record(epoch_delta)?;
        if record_epoch == target_epoch {
            return Some(entry);
        }

        // the slot was reused for another epoch; search the whole window
        binary_search(target_epoch)
    }
}
