use pinocchio::{
    account_info::AccountInfo,
    program_error::ProgramError,
    sysvars::{clock::Clock, rent::Rent, Sysvar},
    ProgramResult,
};

use crate::{
    error::StakeError,
    state::{
        get_stake_state, get_stake_state_mut, Meta, StakeHistorySysvar, StakeStateV2,
    },
    PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
};

use super::{check_stake_authority, relocate_lamports};

pub fn process_split(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    if data.len() < 8 {
        return Err(ProgramError::InvalidInstructionData);
    }
    let split_lamports = u64::from_le_bytes(data[0..8].try_into().unwrap());

    let [source_stake_account_info, destination_stake_account_info, _remaining @ ..] = accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = Clock::get()?;
    let stake_history = &StakeHistorySysvar(clock.epoch);

    if destination_stake_account_info.data_len() != StakeStateV2::size_of() {
        return Err(ProgramError::InvalidAccountData);
    }

    {
        let destination_stake = get_stake_state(destination_stake_account_info)?;
        if *destination_stake != StakeStateV2::Uninitialized {
            return Err(ProgramError::InvalidAccountData);
        }
    }

    let source_lamport_balance = source_stake_account_info.lamports();
    let destination_lamport_balance = destination_stake_account_info.lamports();

    if split_lamports > source_lamport_balance {
        return Err(ProgramError::InsufficientFunds);
    }

    let destination_rent_exempt_reserve = Rent::get()?.minimum_balance(StakeStateV2::size_of());

    let mut source_stake_account = get_stake_state_mut(source_stake_account_info)?;

    let destination_state = match &mut *source_stake_account {
        StakeStateV2::Stake(source_meta, source_stake, stake_flags) => {
            check_stake_authority(accounts, &source_meta.authorized.staker)?;

            let minimum_delegation = crate::get_minimum_delegation();

            let is_active = source_stake.delegation.effective_stake(
                clock.epoch,
                stake_history,
                PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
            ) > 0;

            let validated_split_info = validate_split_amount(
                source_lamport_balance,
                destination_lamport_balance,
                split_lamports,
                source_meta,
                destination_rent_exempt_reserve,
                minimum_delegation,
                is_active,
            )?;

            let (remaining_stake_delta, split_stake_amount) = calculate_split_stake_amounts(
                &validated_split_info,
                split_lamports,
                destination_lamport_balance,
                source_meta,
                u64::from(source_stake.delegation.stake),
                minimum_delegation,
            )?;

            let destination_stake =
                source_stake.split(remaining_stake_delta, split_stake_amount)?;

            // surfaced for the external delegation index
            #[cfg(feature = "logging")]
            pinocchio_log::log!(
                "delegation_upserted: {} lamports split off",
                split_stake_amount
            );

            let mut destination_meta = *source_meta;
            destination_meta.rent_exempt_reserve =
                validated_split_info.destination_rent_exempt_reserve.into();

            Some(StakeStateV2::Stake(
                destination_meta,
                destination_stake,
                *stake_flags,
            ))
        }
        StakeStateV2::Initialized(source_meta) => {
            check_stake_authority(accounts, &source_meta.authorized.staker)?;

            let validated_split_info = validate_split_amount(
                source_lamport_balance,
                destination_lamport_balance,
                split_lamports,
                source_meta,
                destination_rent_exempt_reserve,
                0,     // additional_required_lamports
                false, // is_active
            )?;

            let mut destination_meta = *source_meta;
            destination_meta.rent_exempt_reserve =
                validated_split_info.destination_rent_exempt_reserve.into();

            Some(StakeStateV2::Initialized(destination_meta))
        }
        StakeStateV2::Uninitialized => {
            if !source_stake_account_info.is_signer() {
                return Err(ProgramError::MissingRequiredSignature);
            }
            None
        }
        StakeStateV2::RewardsPool => return Err(ProgramError::InvalidAccountData),
    };

    // Deinitialize state upon zero balance
    if split_lamports == source_lamport_balance {
        *source_stake_account = StakeStateV2::Uninitialized;
    }

    // release the source before touching the destination record; an aliased
    // destination surfaces as a borrow failure there, not silent corruption
    drop(source_stake_account);

    if let Some(destination_state) = destination_state {
        let mut destination_stake_account = get_stake_state_mut(destination_stake_account_info)?;
        *destination_stake_account = destination_state;
    }

    relocate_lamports(
        source_stake_account_info,
        destination_stake_account_info,
        split_lamports,
    )
}

struct ValidatedSplitInfo {
    pub source_remaining_balance: u64,
    pub destination_rent_exempt_reserve: u64,
}

fn validate_split_amount(
    source_lamports: u64,
    destination_lamports: u64,
    split_lamports: u64,
    source_meta: &Meta,
    destination_rent_exempt_reserve: u64,
    additional_required_lamports: u64,
    source_is_active: bool,
) -> Result<ValidatedSplitInfo, ProgramError> {
    // Split amount has to be something
    if split_lamports == 0 {
        return Err(ProgramError::InsufficientFunds);
    }

    // Obviously cannot split more than what the source account has
    if split_lamports > source_lamports {
        return Err(ProgramError::InsufficientFunds);
    }

    // Verify that the source account still has enough lamports left after
    // splitting: EITHER at least the minimum balance, OR zero (in this case the
    // source account is transferring all lamports to new destination account,
    // and the source account will be closed)
    let source_minimum_balance =
        u64::from(source_meta.rent_exempt_reserve).saturating_add(additional_required_lamports);
    let source_remaining_balance = source_lamports.saturating_sub(split_lamports);
    if source_remaining_balance != 0 && source_remaining_balance < source_minimum_balance {
        return Err(ProgramError::InsufficientFunds);
    }

    // If the source is active stake, one of these criteria must be met:
    // 1. the destination account must be prefunded with at least the rent-exempt
    //    reserve, or
    // 2. the split must consume 100% of the source
    if source_is_active
        && source_remaining_balance != 0
        && destination_lamports < destination_rent_exempt_reserve
    {
        return Err(ProgramError::InsufficientFunds);
    }

    // Verify the destination account meets the minimum balance requirements
    // This must handle:
    // 1. The destination account having a different rent exempt reserve due to data
    //    size changes
    // 2. The destination account being prefunded, which would lower the minimum
    //    split amount
    let destination_minimum_balance =
        destination_rent_exempt_reserve.saturating_add(additional_required_lamports);
    let destination_balance_deficit =
        destination_minimum_balance.saturating_sub(destination_lamports);
    if split_lamports < destination_balance_deficit {
        return Err(ProgramError::InsufficientFunds);
    }

    Ok(ValidatedSplitInfo {
        source_remaining_balance,
        destination_rent_exempt_reserve,
    })
}

/// `(remaining_stake_delta, split_stake_amount)` for splitting a delegated
/// source, enforcing the minimum-delegation floor on both sides.
fn calculate_split_stake_amounts(
    validated_split_info: &ValidatedSplitInfo,
    split_lamports: u64,
    destination_lamports: u64,
    source_meta: &Meta,
    source_delegated_stake: u64,
    minimum_delegation: u64,
) -> Result<(u64, u64), ProgramError> {
    // split the stake, subtract rent_exempt_balance unless the destination
    // account already has those lamports in place. this means that the new
    // stake account will have a stake equivalent to lamports minus the
    // rent-exempt reserve if it starts out with a zero balance
    let (remaining_stake_delta, split_stake_amount) =
        if validated_split_info.source_remaining_balance == 0 {
            // If split amount equals the full source stake (as implied by 0
            // source_remaining_balance), the new split stake must equal the same
            // amount, regardless of any current lamport balance in the split account.
            // Since split accounts retain the state of their source account, this
            // prevents any magic activation of stake by prefunding the split account.
            //
            // The new split stake also needs to ignore any positive delta between the
            // original rent_exempt_reserve and the split_rent_exempt_reserve, in order
            // to prevent magic activation of stake by splitting between accounts of
            // different sizes.
            let remaining_stake_delta =
                split_lamports.saturating_sub(source_meta.rent_exempt_reserve.into());
            (remaining_stake_delta, remaining_stake_delta)
        } else {
            // Otherwise, the new split stake should reflect the entire split
            // requested, less any lamports needed to cover the
            // split_rent_exempt_reserve.
            if source_delegated_stake.saturating_sub(split_lamports) < minimum_delegation {
                return Err(StakeError::InsufficientDelegation.into());
            }

            (
                split_lamports,
                split_lamports.saturating_sub(
                    validated_split_info
                        .destination_rent_exempt_reserve
                        .saturating_sub(destination_lamports),
                ),
            )
        };

    if split_stake_amount < minimum_delegation {
        return Err(StakeError::InsufficientDelegation.into());
    }

    Ok((remaining_stake_delta, split_stake_amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVE: u64 = 2_282_880;
    const ONE_SOL: u64 = 1_000_000_000;

    fn meta_with_reserve(reserve: u64) -> Meta {
        Meta {
            rent_exempt_reserve: reserve.into(),
            ..Meta::default()
        }
    }

    fn validate(
        source_lamports: u64,
        destination_lamports: u64,
        split_lamports: u64,
        additional: u64,
        active: bool,
    ) -> Result<ValidatedSplitInfo, ProgramError> {
        validate_split_amount(
            source_lamports,
            destination_lamports,
            split_lamports,
            &meta_with_reserve(RESERVE),
            RESERVE,
            additional,
            active,
        )
    }

    #[test]
    fn split_floor_below_minimum_delegation_is_rejected() {
        // a 5_000_000-lamport delegation with a 1 SOL minimum: carving off
        // 500_000 lamports can never satisfy the floor on the split side
        let source_lamports = RESERVE + 3 * ONE_SOL;
        let split_lamports = 500_000;
        let validated = validate(source_lamports, RESERVE + ONE_SOL, split_lamports, ONE_SOL, true)
            .expect("balances pass; only the delegation floor is at issue");

        assert_eq!(
            calculate_split_stake_amounts(
                &validated,
                split_lamports,
                RESERVE + ONE_SOL,
                &meta_with_reserve(RESERVE),
                5_000_000,
                ONE_SOL,
            ),
            Err(StakeError::InsufficientDelegation.into())
        );
    }

    #[test]
    fn remaining_delegation_below_minimum_is_rejected() {
        let source_lamports = RESERVE + 3 * ONE_SOL;
        // splitting 2.5 SOL off a 3 SOL delegation leaves less than 1 SOL
        let split_lamports = 2 * ONE_SOL + ONE_SOL / 2;
        let validated = validate(source_lamports, RESERVE + ONE_SOL, split_lamports, 0, true)
            .unwrap();

        assert_eq!(
            calculate_split_stake_amounts(
                &validated,
                split_lamports,
                RESERVE + ONE_SOL,
                &meta_with_reserve(RESERVE),
                3 * ONE_SOL,
                ONE_SOL,
            ),
            Err(StakeError::InsufficientDelegation.into())
        );
    }

    #[test]
    fn partial_split_deducts_destination_reserve_deficit() {
        let source_lamports = RESERVE + 4 * ONE_SOL;
        let split_lamports = 2 * ONE_SOL;
        // empty destination: the reserve comes out of the split amount
        let validated = validate(source_lamports, RESERVE, split_lamports, 0, true).unwrap();

        let (remaining_delta, split_amount) = calculate_split_stake_amounts(
            &validated,
            split_lamports,
            RESERVE,
            &meta_with_reserve(RESERVE),
            4 * ONE_SOL,
            1,
        )
        .unwrap();
        assert_eq!(remaining_delta, split_lamports);
        assert_eq!(split_amount, split_lamports);

        let validated = validate(source_lamports, 0, split_lamports, 0, false).unwrap();
        let (remaining_delta, split_amount) = calculate_split_stake_amounts(
            &validated,
            split_lamports,
            0,
            &meta_with_reserve(RESERVE),
            4 * ONE_SOL,
            1,
        )
        .unwrap();
        assert_eq!(remaining_delta, split_lamports);
        assert_eq!(split_amount, split_lamports - RESERVE);
    }

    #[test]
    fn full_drain_ignores_destination_prefund() {
        let source_lamports = RESERVE + ONE_SOL;
        let validated = validate(source_lamports, 5 * ONE_SOL, source_lamports, 0, true).unwrap();
        assert_eq!(validated.source_remaining_balance, 0);

        let (remaining_delta, split_amount) = calculate_split_stake_amounts(
            &validated,
            source_lamports,
            5 * ONE_SOL,
            &meta_with_reserve(RESERVE),
            ONE_SOL,
            1,
        )
        .unwrap();
        // stake moves net of the source reserve, prefunding notwithstanding
        assert_eq!(remaining_delta, ONE_SOL);
        assert_eq!(split_amount, ONE_SOL);
    }

    #[test]
    fn balance_preconditions() {
        // zero split
        assert_eq!(
            validate(RESERVE + ONE_SOL, 0, 0, 0, false).err(),
            Some(ProgramError::InsufficientFunds)
        );
        // overdraw
        assert_eq!(
            validate(RESERVE + ONE_SOL, 0, RESERVE + ONE_SOL + 1, 0, false).err(),
            Some(ProgramError::InsufficientFunds)
        );
        // source left below its reserve
        assert_eq!(
            validate(RESERVE + ONE_SOL, 0, ONE_SOL + 1, 0, false).err(),
            Some(ProgramError::InsufficientFunds)
        );
        // active source needs a prefunded destination reserve
        assert_eq!(
            validate(RESERVE + 2 * ONE_SOL, RESERVE - 1, ONE_SOL, 0, true).err(),
            Some(ProgramError::InsufficientFunds)
        );
        assert!(validate(RESERVE + 2 * ONE_SOL, RESERVE, ONE_SOL, 0, true).is_ok());
        // inactive source may fund the destination reserve from the split
        assert!(validate(RESERVE + 2 * ONE_SOL, 0, ONE_SOL, 0, false).is_ok());
        // but the split must cover the destination deficit
        assert_eq!(
            validate(RESERVE + 2 * ONE_SOL, 0, RESERVE - 1, 0, false).err(),
            Some(ProgramError::InsufficientFunds)
        );
    }
}
