pub mod authorized;
pub mod delegation;
pub mod lockup;
pub mod merge_kind;
pub mod meta;
pub mod pod;
pub mod stake;
pub mod stake_flags;
pub mod stake_history;
pub mod stake_history_sysvar;
pub mod stake_state_v2;
pub mod vote_state;

pub use authorized::*;
pub use delegation::*;
pub use lockup::*;
pub use merge_kind::*;
pub use meta::*;
pub use pod::*;
pub use stake::*;
pub use stake_flags::*;
pub use stake_history::*;
pub use stake_history_sysvar::*;
pub use stake_state_v2::*;
pub use vote_state::*;

use pinocchio::{
    account_info::{AccountInfo, Ref, RefMut},
    program_error::ProgramError,
};

pub type Epoch = PodU64;
pub type UnixTimestamp = PodI64;

pub(crate) fn checked_add(a: u64, b: u64) -> Result<u64, ProgramError> {
    a.checked_add(b).ok_or(ProgramError::InsufficientFunds)
}

/// Shared, owner-checked borrow of a stake account's state.
pub fn get_stake_state(
    stake_account_info: &AccountInfo,
) -> Result<Ref<StakeStateV2>, ProgramError> {
    if !stake_account_info.is_owned_by(&crate::ID) {
        return Err(ProgramError::InvalidAccountOwner);
    }

    StakeStateV2::from_account_info(stake_account_info)
}

/// Exclusive, owner-checked borrow of a stake account's state.
///
/// Fails with a borrow error if the record is already borrowed anywhere in
/// the instruction, including through an aliasing account index; callers
/// drop the handle (explicitly or by scope) before touching lamports on the
/// same account.
pub fn get_stake_state_mut(
    stake_account_info: &AccountInfo,
) -> Result<RefMut<StakeStateV2>, ProgramError> {
    if !stake_account_info.is_owned_by(&crate::ID) {
        return Err(ProgramError::InvalidAccountOwner);
    }

    StakeStateV2::from_account_info_mut(stake_account_info)
}
