use pinocchio::{
    account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey, ProgramResult,
};

use crate::{
    error::StakeError,
    pinocchio_add::clock,
    state::{get_stake_state_mut, Lockup, StakeHistory, StakeStateV2},
    PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
};

use super::{optional_custodian, relocate_lamports};

pub fn process_withdraw(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    if data.len() < 8 {
        return Err(ProgramError::InvalidInstructionData);
    }
    let withdraw_lamports = u64::from_le_bytes(data[0..8].try_into().unwrap());

    let [source_stake_account_info, destination_info, clock_info, stake_history_info, withdraw_authority_info, remaining @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    if !withdraw_authority_info.is_signer() {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let withdraw_authority = withdraw_authority_info.key();
    let custodian = optional_custodian(remaining)?;

    let clock = &clock::from_account_info(clock_info)?;
    let stake_history = StakeHistory::from_account_info(stake_history_info)?;

    let mut stake_account = get_stake_state_mut(source_stake_account_info)?;

    // the authority for an uninitialized account is the account key itself;
    // everywhere else the recorded withdrawer (or the custodian standing in
    // for it) must have signed
    let (lockup, reserve, is_staked) = match &*stake_account {
        StakeStateV2::Stake(meta, stake, _stake_flags) => {
            check_withdraw_authority(&meta.authorized.withdrawer, withdraw_authority, custodian)?;

            // if we have a deactivation epoch and we're in cooldown
            let staked = if clock.epoch >= u64::from(stake.delegation.deactivation_epoch) {
                stake.delegation.effective_stake(
                    clock.epoch,
                    &stake_history,
                    PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
                )
            } else {
                // Assume full stake if the stake account hasn't been
                //  de-activated, because in the future the exposed stake
                //  might be higher than stake.stake() due to warmup
                stake.delegation.stake.into()
            };
            let staked_and_reserve = staked
                .checked_add(meta.rent_exempt_reserve.into())
                .ok_or(ProgramError::InsufficientFunds)?;
            (meta.lockup, staked_and_reserve, staked != 0)
        }
        StakeStateV2::Initialized(meta) => {
            check_withdraw_authority(&meta.authorized.withdrawer, withdraw_authority, custodian)?;
            // stake accounts must have a balance >= rent_exempt_reserve
            (meta.lockup, meta.rent_exempt_reserve.into(), false)
        }
        StakeStateV2::Uninitialized => {
            check_withdraw_authority(
                source_stake_account_info.key(),
                withdraw_authority,
                custodian,
            )?;
            (Lockup::default(), 0, false) // no lockup, no restrictions
        }
        StakeStateV2::RewardsPool => return Err(ProgramError::InvalidAccountData),
    };

    // verify that lockup has expired or that the withdrawal is signed by the
    // custodian; both epoch and unix_timestamp must have passed
    if lockup.is_in_force(clock, custodian) {
        return Err(StakeError::LockupInForce.into());
    }

    let stake_account_lamports = source_stake_account_info.lamports();
    if withdraw_lamports == stake_account_lamports {
        // if the stake is active, we mustn't allow the account to go away
        if is_staked {
            return Err(ProgramError::InsufficientFunds);
        }

        // Deinitialize state upon zero balance
        *stake_account = StakeStateV2::Uninitialized;

        #[cfg(feature = "logging")]
        pinocchio_log::log!("delegation_removed: account drained");
    } else {
        // a partial withdrawal must not deplete the reserve
        let withdraw_lamports_and_reserve = withdraw_lamports
            .checked_add(reserve)
            .ok_or(ProgramError::InsufficientFunds)?;
        if withdraw_lamports_and_reserve > stake_account_lamports {
            return Err(ProgramError::InsufficientFunds);
        }
    }

    drop(stake_account);

    relocate_lamports(
        source_stake_account_info,
        destination_info,
        withdraw_lamports,
    )
}

fn check_withdraw_authority(
    authorized_withdrawer: &Pubkey,
    withdraw_authority: &Pubkey,
    custodian: Option<&Pubkey>,
) -> ProgramResult {
    if let Some(custodian) = custodian {
        if authorized_withdrawer != custodian && authorized_withdrawer != withdraw_authority {
            return Err(ProgramError::MissingRequiredSignature);
        }
    } else if authorized_withdrawer != withdraw_authority {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}
