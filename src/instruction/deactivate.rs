use pinocchio::{account_info::AccountInfo, program_error::ProgramError, ProgramResult};

use crate::{
    pinocchio_add::clock,
    state::{get_stake_state_mut, StakeStateV2},
};

use super::check_stake_authority;

pub fn process_deactivate(accounts: &[AccountInfo], _data: &[u8]) -> ProgramResult {
    let [stake_account_info, clock_info, _remaining @ ..] = accounts else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = &clock::from_account_info(clock_info)?;

    let mut stake_account = get_stake_state_mut(stake_account_info)?;
    match &mut *stake_account {
        StakeStateV2::Stake(meta, stake, _stake_flags) => {
            check_stake_authority(accounts, &meta.authorized.staker)?;
            stake.deactivate(clock.epoch.into())?;

            // surfaced for the external delegation index
            #[cfg(feature = "logging")]
            pinocchio_log::log!("delegation_removed: cooling from epoch {}", clock.epoch);

            Ok(())
        }
        StakeStateV2::Uninitialized
        | StakeStateV2::Initialized(_)
        | StakeStateV2::RewardsPool => Err(ProgramError::InvalidAccountData),
    }
}
