use pinocchio::{
    account_info::AccountInfo,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvars::{clock::Clock, Sysvar},
    ProgramResult,
};

use crate::state::{
    get_stake_state, get_stake_state_mut, Epoch, SetLockupSignerArgs, StakeStateV2, UnixTimestamp,
};

use super::signed_by;

/// Sequential reader over bincode-encoded `Option` fields.
struct WireCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProgramError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(ProgramError::InvalidInstructionData)?;
        self.pos += len;
        Ok(bytes)
    }

    fn take_option_tag(&mut self) -> Result<bool, ProgramError> {
        match self.take(1)? {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }

    fn take_option_bytes<const N: usize>(&mut self) -> Result<Option<[u8; N]>, ProgramError> {
        if self.take_option_tag()? {
            Ok(Some(self.take(N)?.try_into().unwrap()))
        } else {
            Ok(None)
        }
    }

    fn finish(self) -> Result<(), ProgramError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(ProgramError::InvalidInstructionData)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LockupArgs {
    pub unix_timestamp: Option<UnixTimestamp>,
    pub epoch: Option<Epoch>,
    pub custodian: Option<Pubkey>,
}

impl LockupArgs {
    pub fn from_data(data: &[u8]) -> Result<Self, ProgramError> {
        let mut cursor = WireCursor::new(data);
        let args = LockupArgs {
            unix_timestamp: cursor
                .take_option_bytes::<8>()?
                .map(|b| i64::from_le_bytes(b).into()),
            epoch: cursor
                .take_option_bytes::<8>()?
                .map(|b| u64::from_le_bytes(b).into()),
            custodian: cursor.take_option_bytes::<32>()?,
        };
        cursor.finish()?;
        Ok(args)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LockupCheckedArgs {
    pub unix_timestamp: Option<UnixTimestamp>,
    pub epoch: Option<Epoch>,
}

impl LockupCheckedArgs {
    pub fn from_data(data: &[u8]) -> Result<Self, ProgramError> {
        let mut cursor = WireCursor::new(data);
        let args = LockupCheckedArgs {
            unix_timestamp: cursor
                .take_option_bytes::<8>()?
                .map(|b| i64::from_le_bytes(b).into()),
            epoch: cursor
                .take_option_bytes::<8>()?
                .map(|b| u64::from_le_bytes(b).into()),
        };
        cursor.finish()?;
        Ok(args)
    }
}

pub fn process_set_lockup(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let lockup_args = LockupArgs::from_data(data)?;

    let [stake_account_info, _remaining @ ..] = accounts else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let signer_args = get_set_lockup_signer_args(stake_account_info, accounts)?;
    let clock = Clock::get()?;

    do_set_lockup(stake_account_info, &lockup_args, signer_args, &clock)
}

pub fn process_set_lockup_checked(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let lockup_checked_args = LockupCheckedArgs::from_data(data)?;

    let [stake_account_info, _old_withdraw_or_lockup_authority_info, remaining @ ..] = accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    let clock = Clock::get()?;

    // the new custodian comes from the accounts and must have signed
    let custodian = super::optional_custodian(remaining)?;

    let signer_args = get_set_lockup_signer_args(stake_account_info, accounts)?;

    let lockup_args = LockupArgs {
        unix_timestamp: lockup_checked_args.unix_timestamp,
        epoch: lockup_checked_args.epoch,
        custodian: custodian.copied(),
    };

    do_set_lockup(stake_account_info, &lockup_args, signer_args, &clock)
}

fn do_set_lockup(
    stake_account_info: &AccountInfo,
    lockup: &LockupArgs,
    signer_args: SetLockupSignerArgs,
    clock: &Clock,
) -> ProgramResult {
    let mut stake_account = get_stake_state_mut(stake_account_info)?;
    match &mut *stake_account {
        StakeStateV2::Initialized(meta) | StakeStateV2::Stake(meta, _, _) => {
            meta.set_lockup(lockup, signer_args, clock)
        }
        StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
            Err(ProgramError::InvalidAccountData)
        }
    }
}

fn get_set_lockup_signer_args(
    stake_account_info: &AccountInfo,
    accounts: &[AccountInfo],
) -> Result<SetLockupSignerArgs, ProgramError> {
    let stake_account = get_stake_state(stake_account_info)?;

    match &*stake_account {
        StakeStateV2::Initialized(meta) | StakeStateV2::Stake(meta, _, _) => {
            Ok(SetLockupSignerArgs {
                has_custodian_signer: signed_by(accounts, &meta.lockup.custodian),
                has_withdrawer_signer: signed_by(accounts, &meta.authorized.withdrawer),
            })
        }
        StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
            Err(ProgramError::InvalidAccountData)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct WireLockupArgs {
        unix_timestamp: Option<i64>,
        epoch: Option<u64>,
        custodian: Option<[u8; 32]>,
    }

    #[derive(Serialize)]
    struct WireLockupCheckedArgs {
        unix_timestamp: Option<i64>,
        epoch: Option<u64>,
    }

    const TS: i64 = 3_609_733_389_592_650_838;
    const EPOCH: u64 = 9_464_321_479_845_648;
    const CUSTODIAN: [u8; 32] = [
        13, 54, 98, 123, 59, 67, 165, 78, 3, 12, 23, 45, 67, 89, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10,
        11, 12, 13, 14, 15, 16, 17, 18,
    ];

    #[test]
    fn decodes_every_lockup_args_combination() {
        for unix_timestamp in [None, Some(TS)] {
            for epoch in [None, Some(EPOCH)] {
                for custodian in [None, Some(CUSTODIAN)] {
                    let data = bincode::serialize(&WireLockupArgs {
                        unix_timestamp,
                        epoch,
                        custodian,
                    })
                    .unwrap();

                    let args = LockupArgs::from_data(&data).unwrap();
                    assert_eq!(args.unix_timestamp.map(i64::from), unix_timestamp);
                    assert_eq!(args.epoch.map(u64::from), epoch);
                    assert_eq!(args.custodian, custodian);
                }
            }
        }
    }

    #[test]
    fn decodes_every_lockup_checked_args_combination() {
        for unix_timestamp in [None, Some(TS)] {
            for epoch in [None, Some(EPOCH)] {
                let data = bincode::serialize(&WireLockupCheckedArgs {
                    unix_timestamp,
                    epoch,
                })
                .unwrap();

                let args = LockupCheckedArgs::from_data(&data).unwrap();
                assert_eq!(args.unix_timestamp.map(i64::from), unix_timestamp);
                assert_eq!(args.epoch.map(u64::from), epoch);
            }
        }
    }

    #[test]
    fn rejects_malformed_encodings() {
        // bad option tag
        assert!(LockupArgs::from_data(&[2, 0, 0]).is_err());
        // truncated payload
        assert!(LockupArgs::from_data(&[1, 0, 0]).is_err());
        // trailing bytes
        assert!(LockupArgs::from_data(&[0, 0, 0, 0]).is_err());
        // empty
        assert!(LockupCheckedArgs::from_data(&[]).is_err());
    }
}
