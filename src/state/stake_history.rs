use pinocchio::{
    account_info::{AccountInfo, Ref},
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvars::clock::Epoch,
};
use pinocchio_pubkey::pubkey;

pub const STAKE_HISTORY_ID: Pubkey = pubkey!("SysvarStakeHistory1111111111111111111111111");

/// Upper bound on retained epochs; it should never take as many as 512
/// epochs to warm up or cool down.
pub const MAX_ENTRIES: usize = 512;

/// One epoch's cluster-wide stake totals.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StakeHistoryEntry {
    pub effective: u64,    // effective stake at this epoch
    pub activating: u64,   // sum of portion of stakes not fully warmed up
    pub deactivating: u64, // requested to be cooled down, not fully deactivated yet
}

impl StakeHistoryEntry {
    pub fn with_effective(effective: u64) -> Self {
        Self {
            effective,
            ..Self::default()
        }
    }

    pub fn with_effective_and_activating(effective: u64, activating: u64) -> Self {
        Self {
            effective,
            activating,
            ..Self::default()
        }
    }

    pub fn with_deactivating(deactivating: u64) -> Self {
        Self {
            effective: deactivating,
            deactivating,
            ..Self::default()
        }
    }
}

/// Epoch-indexed lookup of cluster stake totals.
///
/// The ramp simulation is generic over this so it can run against the sysvar
/// account, the `sol_get_sysvar` syscall, or a fixture.
pub trait StakeHistoryGetEntry {
    fn get_entry(&self, target_epoch: Epoch) -> Option<StakeHistoryEntry>;
}

// serialized form: u64 entry count, then per entry
// (epoch, effective, activating, deactivating), newest epoch first
pub(crate) const ENTRY_SERIALIZED_SIZE: usize = 32;
pub(crate) const LEN_PREFIX_SIZE: usize = 8;

#[inline]
fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

#[inline]
fn entry_count(data: &[u8]) -> usize {
    let claimed = read_u64(data, 0).unwrap_or(0);
    let held = data.len().saturating_sub(LEN_PREFIX_SIZE) / ENTRY_SERIALIZED_SIZE;
    (claimed.min(MAX_ENTRIES as u64) as usize).min(held)
}

#[inline]
fn epoch_at(data: &[u8], index: usize) -> Option<Epoch> {
    read_u64(data, LEN_PREFIX_SIZE + index * ENTRY_SERIALIZED_SIZE)
}

#[inline]
fn entry_at(data: &[u8], index: usize) -> Option<StakeHistoryEntry> {
    let base = LEN_PREFIX_SIZE + index * ENTRY_SERIALIZED_SIZE;
    Some(StakeHistoryEntry {
        effective: read_u64(data, base + 8)?,
        activating: read_u64(data, base + 16)?,
        deactivating: read_u64(data, base + 24)?,
    })
}

/// Descending binary search over entries ordered by decreasing epoch.
fn binary_search(data: &[u8], len: usize, target_epoch: Epoch) -> Option<StakeHistoryEntry> {
    let mut lo = 0usize;
    let mut hi = len;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_epoch = epoch_at(data, mid)?;
        if mid_epoch == target_epoch {
            return entry_at(data, mid);
        } else if mid_epoch < target_epoch {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    None
}

/// Query the serialized history for `target_epoch`.
///
/// The populated window is contiguous in the common case, so the entry for
/// `target_epoch` normally sits `newest_epoch - target_epoch` records in;
/// the stored epoch is verified before trusting that slot (the backing
/// storage reuses slots ring-wise), and a mismatch or an offset past the
/// window falls back to binary search.
pub(crate) fn get_entry_from_serialized(
    data: &[u8],
    target_epoch: Epoch,
) -> Option<StakeHistoryEntry> {
    let len = entry_count(data);
    if len == 0 {
        return None;
    }

    let newest_epoch = epoch_at(data, 0)?;
    if target_epoch > newest_epoch {
        return None;
    }

    let offset = (newest_epoch - target_epoch) as usize;
    if offset < len {
        if epoch_at(data, offset)? == target_epoch {
            return entry_at(data, offset);
        }
    }

    binary_search(data, len, target_epoch)
}

/// Zero-copy view over the StakeHistory sysvar account data.
///
/// Holds a shared borrow of the account for its lifetime; used by the
/// processors whose wire format binds the sysvar account.
pub struct StakeHistory<'a> {
    data: Ref<'a, [u8]>,
}

impl<'a> StakeHistory<'a> {
    pub fn from_account_info(account_info: &'a AccountInfo) -> Result<Self, ProgramError> {
        if account_info.key() != &STAKE_HISTORY_ID {
            return Err(ProgramError::InvalidArgument);
        }
        let data = account_info.try_borrow_data()?;
        Ok(Self { data })
    }
}

impl StakeHistoryGetEntry for StakeHistory<'_> {
    fn get_entry(&self, target_epoch: Epoch) -> Option<StakeHistoryEntry> {
        get_entry_from_serialized(&self.data, target_epoch)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Serialize `(epoch, entry)` pairs the way the sysvar account lays them
    /// out: count prefix, then records newest-first.
    pub(crate) fn serialize_history(entries: &[(Epoch, StakeHistoryEntry)]) -> Vec<u8> {
        let mut data = Vec::with_capacity(LEN_PREFIX_SIZE + entries.len() * ENTRY_SERIALIZED_SIZE);
        data.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        for (epoch, entry) in entries {
            data.extend_from_slice(&epoch.to_le_bytes());
            data.extend_from_slice(&entry.effective.to_le_bytes());
            data.extend_from_slice(&entry.activating.to_le_bytes());
            data.extend_from_slice(&entry.deactivating.to_le_bytes());
        }
        data
    }

    /// Owned fixture implementing the lookup trait for ramp tests.
    pub(crate) struct HistoryFixture(Vec<u8>);

    impl HistoryFixture {
        pub(crate) fn new(mut entries: Vec<(Epoch, StakeHistoryEntry)>) -> Self {
            entries.sort_by(|a, b| b.0.cmp(&a.0));
            Self(serialize_history(&entries))
        }
    }

    impl StakeHistoryGetEntry for HistoryFixture {
        fn get_entry(&self, target_epoch: Epoch) -> Option<StakeHistoryEntry> {
            get_entry_from_serialized(&self.0, target_epoch)
        }
    }
}
