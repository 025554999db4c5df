use pinocchio::{
    account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey, sysvars::clock::Clock,
    ProgramResult,
};

use crate::{
    pinocchio_add::{clock, pubkey::create_with_seed},
    state::{
        get_stake_state, get_stake_state_mut, AuthorizeSignerArgs, StakeAuthorize, StakeStateV2,
    },
};

use super::{optional_custodian, signed_by};

fn decode_stake_authorize(word: &[u8]) -> Result<StakeAuthorize, ProgramError> {
    match u32::from_le_bytes(
        word.try_into()
            .map_err(|_| ProgramError::InvalidInstructionData)?,
    ) {
        0 => Ok(StakeAuthorize::Staker),
        1 => Ok(StakeAuthorize::Withdrawer),
        _ => Err(ProgramError::InvalidInstructionData),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct AuthorizeArgs {
    new_authority: Pubkey,
    authority_type: StakeAuthorize,
}

impl AuthorizeArgs {
    fn from_data(data: &[u8]) -> Result<AuthorizeArgs, ProgramError> {
        if data.len() != 36 {
            return Err(ProgramError::InvalidInstructionData);
        }
        Ok(AuthorizeArgs {
            new_authority: data[0..32].try_into().unwrap(),
            authority_type: decode_stake_authorize(&data[32..36])?,
        })
    }
}

/// Seed-addressed authority reference: the authority key is
/// `create_with_seed(base, seed, owner)` and presenting it means presenting
/// a signature from `base`.
struct SeedAuthorityArgs<'a> {
    authority_type: StakeAuthorize,
    seed: &'a [u8],
    owner: Pubkey,
}

impl<'a> SeedAuthorityArgs<'a> {
    /// `(seed string, owner)` tail shared by both seed-args layouts.
    fn seed_and_owner(data: &'a [u8]) -> Result<(&'a [u8], Pubkey), ProgramError> {
        let seed_len = u64::from_le_bytes(
            data.get(0..8)
                .ok_or(ProgramError::InvalidInstructionData)?
                .try_into()
                .unwrap(),
        ) as usize;
        let seed_end = seed_len
            .checked_add(8)
            .ok_or(ProgramError::InvalidInstructionData)?;
        let owner_end = seed_end
            .checked_add(32)
            .ok_or(ProgramError::InvalidInstructionData)?;
        if data.len() != owner_end {
            return Err(ProgramError::InvalidInstructionData);
        }
        let seed = data
            .get(8..seed_end)
            .ok_or(ProgramError::InvalidInstructionData)?;
        let owner_bytes = data
            .get(seed_end..owner_end)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((seed, owner_bytes.try_into().unwrap()))
    }
}

pub fn process_authorize(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let authorize_args = AuthorizeArgs::from_data(data)?;

    let [stake_account_info, clock_info, _stake_or_withdraw_authority_info, remaining @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = &clock::from_account_info(clock_info)?;
    let custodian = optional_custodian(remaining)?;
    let signer_args = get_authorize_signer_args(stake_account_info, custodian, accounts)?;

    do_authorize(
        stake_account_info,
        signer_args,
        &authorize_args.new_authority,
        authorize_args.authority_type,
        custodian,
        clock,
    )
}

pub fn process_authorize_checked(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let authority_type = decode_stake_authorize(data)?;

    let [stake_account_info, clock_info, _old_stake_or_withdraw_authority_info, new_stake_or_withdraw_authority_info, remaining @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = &clock::from_account_info(clock_info)?;

    if !new_stake_or_withdraw_authority_info.is_signer() {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let custodian = optional_custodian(remaining)?;
    let signer_args = get_authorize_signer_args(stake_account_info, custodian, accounts)?;

    do_authorize(
        stake_account_info,
        signer_args,
        new_stake_or_withdraw_authority_info.key(),
        authority_type,
        custodian,
        clock,
    )
}

pub fn process_authorize_with_seed(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    if data.len() < 36 {
        return Err(ProgramError::InvalidInstructionData);
    }
    let new_authority: Pubkey = data[0..32].try_into().unwrap();
    let (seed, owner) = SeedAuthorityArgs::seed_and_owner(&data[36..])?;
    let args = SeedAuthorityArgs {
        authority_type: decode_stake_authorize(&data[32..36])?,
        seed,
        owner,
    };

    let [stake_account_info, authority_base_info, clock_info, remaining @ ..] = accounts else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = &clock::from_account_info(clock_info)?;
    let custodian = optional_custodian(remaining)?;

    let signer_args =
        get_seed_authority_signer_args(stake_account_info, authority_base_info, &args, custodian)?;

    do_authorize(
        stake_account_info,
        signer_args,
        &new_authority,
        args.authority_type,
        custodian,
        clock,
    )
}

pub fn process_authorize_checked_with_seed(
    accounts: &[AccountInfo],
    data: &[u8],
) -> ProgramResult {
    if data.len() < 4 {
        return Err(ProgramError::InvalidInstructionData);
    }
    let (seed, owner) = SeedAuthorityArgs::seed_and_owner(&data[4..])?;
    let args = SeedAuthorityArgs {
        authority_type: decode_stake_authorize(&data[0..4])?,
        seed,
        owner,
    };

    let [stake_account_info, authority_base_info, clock_info, new_stake_or_withdraw_authority_info, remaining @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = &clock::from_account_info(clock_info)?;

    if !new_stake_or_withdraw_authority_info.is_signer() {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let custodian = optional_custodian(remaining)?;

    let signer_args =
        get_seed_authority_signer_args(stake_account_info, authority_base_info, &args, custodian)?;

    do_authorize(
        stake_account_info,
        signer_args,
        new_stake_or_withdraw_authority_info.key(),
        args.authority_type,
        custodian,
        clock,
    )
}

fn do_authorize(
    stake_account_info: &AccountInfo,
    signer_args: AuthorizeSignerArgs,
    new_authority: &Pubkey,
    authority_type: StakeAuthorize,
    custodian: Option<&Pubkey>,
    clock: &Clock,
) -> ProgramResult {
    let mut stake_account = get_stake_state_mut(stake_account_info)?;
    match &mut *stake_account {
        StakeStateV2::Initialized(meta) | StakeStateV2::Stake(meta, _, _) => {
            meta.authorized.authorize(
                signer_args,
                new_authority,
                authority_type,
                (&meta.lockup, clock, custodian),
            )
        }
        StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
            Err(ProgramError::InvalidAccountData)
        }
    }
}

/// Which relevant authorities signed, scanning every bound account.
fn get_authorize_signer_args(
    stake_account_info: &AccountInfo,
    custodian: Option<&Pubkey>,
    accounts: &[AccountInfo],
) -> Result<AuthorizeSignerArgs, ProgramError> {
    let stake_account = get_stake_state(stake_account_info)?;

    match &*stake_account {
        StakeStateV2::Initialized(meta) | StakeStateV2::Stake(meta, _, _) => {
            Ok(AuthorizeSignerArgs {
                has_custodian_signer: custodian
                    .map(|custodian| signed_by(accounts, custodian))
                    .unwrap_or(false),
                has_staker_signer: signed_by(accounts, &meta.authorized.staker),
                has_withdrawer_signer: signed_by(accounts, &meta.authorized.withdrawer),
            })
        }
        StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
            Err(ProgramError::InvalidAccountData)
        }
    }
}

/// Which relevant authorities signed, where the only accepted authority
/// signature is the address derived from a signing base account. The base
/// key itself deliberately does not count.
fn get_seed_authority_signer_args(
    stake_account_info: &AccountInfo,
    authority_base_info: &AccountInfo,
    args: &SeedAuthorityArgs,
    custodian: Option<&Pubkey>,
) -> Result<AuthorizeSignerArgs, ProgramError> {
    let derived = if authority_base_info.is_signer() {
        Some(create_with_seed(
            authority_base_info.key(),
            args.seed,
            &args.owner,
        )?)
    } else {
        None
    };

    let stake_account = get_stake_state(stake_account_info)?;
    match &*stake_account {
        StakeStateV2::Initialized(meta) | StakeStateV2::Stake(meta, _, _) => {
            Ok(AuthorizeSignerArgs {
                has_custodian_signer: custodian.is_some(),
                has_staker_signer: derived.as_ref() == Some(&meta.authorized.staker),
                has_withdrawer_signer: derived.as_ref() == Some(&meta.authorized.withdrawer),
            })
        }
        StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
            Err(ProgramError::InvalidAccountData)
        }
    }
}
