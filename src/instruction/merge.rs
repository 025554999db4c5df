use pinocchio::{account_info::AccountInfo, program_error::ProgramError, ProgramResult};

use crate::{
    pinocchio_add::clock,
    state::{get_stake_state_mut, MergeKind, StakeHistory, StakeStateV2},
};

use super::{check_stake_authority, relocate_lamports};

pub fn process_merge(accounts: &[AccountInfo], _data: &[u8]) -> ProgramResult {
    let [destination_stake_account_info, source_stake_account_info, clock_info, stake_history_info, _remaining @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = clock::from_account_info(clock_info)?;
    let stake_history = StakeHistory::from_account_info(stake_history_info)?;

    if source_stake_account_info.key() == destination_stake_account_info.key() {
        return Err(ProgramError::InvalidArgument);
    }

    let mut source_stake_account = get_stake_state_mut(source_stake_account_info)?;
    let mut destination_stake_account = get_stake_state_mut(destination_stake_account_info)?;

    #[cfg(feature = "logging")]
    pinocchio::msg!("Checking if destination stake is mergeable");
    let destination_merge_kind = MergeKind::get_if_mergeable(
        &*destination_stake_account,
        destination_stake_account_info.lamports(),
        &*clock,
        &stake_history,
    )?;

    // Authorized staker is allowed to split/merge accounts
    check_stake_authority(accounts, &destination_merge_kind.meta().authorized.staker)?;

    #[cfg(feature = "logging")]
    pinocchio::msg!("Checking if source stake is mergeable");
    let source_merge_kind = MergeKind::get_if_mergeable(
        &*source_stake_account,
        source_stake_account_info.lamports(),
        &*clock,
        &stake_history,
    )?;

    #[cfg(feature = "logging")]
    pinocchio::msg!("Merging stake accounts");
    if let Some(merged_state) = destination_merge_kind.merge(source_merge_kind, &*clock)? {
        *destination_stake_account = merged_state;

        // surfaced for the external delegation index
        #[cfg(feature = "logging")]
        pinocchio_log::log!("delegation_upserted: destination absorbed source");
    }

    // Source is about to be drained, deinitialize its state
    *source_stake_account = StakeStateV2::Uninitialized;

    #[cfg(feature = "logging")]
    pinocchio_log::log!("delegation_removed: merged away");

    // release both records before moving their lamports
    drop(source_stake_account);
    drop(destination_stake_account);

    relocate_lamports(
        source_stake_account_info,
        destination_stake_account_info,
        source_stake_account_info.lamports(),
    )
}
