use pinocchio::{
    account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey, sysvars::clock,
    ProgramResult,
};

use crate::{
    error::StakeError,
    pinocchio_add::clock as clock_sysvar,
    state::{
        get_credits, get_stake_state_mut, Delegation, Meta, Stake, StakeFlags, StakeHistory,
        StakeHistoryGetEntry, StakeStateV2,
    },
    PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
};

use super::check_stake_authority;

pub fn process_delegate(accounts: &[AccountInfo], _data: &[u8]) -> ProgramResult {
    let [stake_account_info, vote_account_info, clock_info, stake_history_info, _stake_config_info, _remaining @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = &clock_sysvar::from_account_info(clock_info)?;
    let stake_history = StakeHistory::from_account_info(stake_history_info)?;

    let credits = get_credits(vote_account_info)?;

    let mut stake_account = get_stake_state_mut(stake_account_info)?;

    match &mut *stake_account {
        StakeStateV2::Initialized(meta) => {
            check_stake_authority(accounts, &meta.authorized.staker)?;

            let stake_amount = validate_delegated_amount(stake_account_info, meta)?;

            let stake = Stake {
                delegation: Delegation::new(vote_account_info.key(), stake_amount, clock.epoch),
                credits_observed: credits.into(),
            };

            *stake_account = StakeStateV2::Stake(*meta, stake, StakeFlags::empty());

            // surfaced for the external delegation index
            #[cfg(feature = "logging")]
            pinocchio_log::log!("delegation_upserted: {} lamports", stake_amount);
        }
        StakeStateV2::Stake(meta, stake, _stake_flags) => {
            check_stake_authority(accounts, &meta.authorized.staker)?;

            let stake_amount = validate_delegated_amount(stake_account_info, meta)?;

            redelegate_stake(
                stake,
                stake_amount,
                vote_account_info.key(),
                credits,
                clock.epoch,
                &stake_history,
            )?;

            // surfaced for the external delegation index
            #[cfg(feature = "logging")]
            pinocchio_log::log!(
                "delegation_upserted: {} lamports",
                u64::from(stake.delegation.stake)
            );
        }
        StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
            return Err(ProgramError::InvalidAccountData)
        }
    }

    Ok(())
}

/// Ensure the stake delegation amount is valid.  This checks that the account
/// meets the minimum balance requirements of delegated stake.  If not, return
/// an error.
fn validate_delegated_amount(account: &AccountInfo, meta: &Meta) -> Result<u64, ProgramError> {
    let stake_amount = account
        .lamports()
        .saturating_sub(meta.rent_exempt_reserve.into()); // can't stake the rent

    // Stake accounts may be initialized with a stake amount below the minimum
    // delegation so check that the minimum is met before delegation.
    if stake_amount < crate::get_minimum_delegation() {
        return Err(StakeError::InsufficientDelegation.into());
    }
    Ok(stake_amount)
}

fn redelegate_stake<T: StakeHistoryGetEntry>(
    stake: &mut Stake,
    stake_lamports: u64,
    voter_pubkey: &Pubkey,
    credits: u64,
    epoch: clock::Epoch,
    stake_history: &T,
) -> Result<(), ProgramError> {
    // If stake is currently active:
    if stake.delegation.effective_stake(
        epoch,
        stake_history,
        PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
    ) != 0
    {
        // If pubkey of new voter is the same as current,
        // and we are scheduled to start deactivating this epoch,
        // we rescind deactivation
        if stake.delegation.voter_pubkey == *voter_pubkey
            && epoch == u64::from(stake.delegation.deactivation_epoch)
        {
            stake.delegation.deactivation_epoch = u64::MAX.into();
            return Ok(());
        } else {
            // can't redelegate to another pubkey if stake is active.
            return Err(StakeError::TooSoonToRedelegate.into());
        }
    }

    // Either the stake is freshly activated, is active but has been
    // deactivated this epoch, or has fully de-activated.
    // Redelegation implies either re-activation or un-deactivation
    stake.delegation.stake = stake_lamports.into();
    stake.delegation.activation_epoch = epoch.into();
    stake.delegation.deactivation_epoch = u64::MAX.into();
    stake.delegation.voter_pubkey = *voter_pubkey;
    stake.credits_observed = credits.into();
    Ok(())
}
