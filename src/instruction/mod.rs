pub mod authorize;
pub mod deactivate;
pub mod deactivate_delinquent;
pub mod delegate;
pub mod get_minimum_delegation;
pub mod initialize;
pub mod merge;
pub mod move_stake_lamports;
pub mod set_lockup;
pub mod split;
pub mod withdraw;

pub use authorize::*;
pub use deactivate::*;
pub use deactivate_delinquent::*;
pub use delegate::*;
pub use get_minimum_delegation::*;
pub use initialize::*;
pub use merge::*;
pub use move_stake_lamports::*;
pub use set_lockup::*;
pub use split::*;
pub use withdraw::*;

use pinocchio::{
    account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey, ProgramResult,
};

/// Move lamports between two borrowed accounts.
///
/// Each side's lamport lock is taken and released separately so a caller may
/// re-read either balance immediately afterwards.
fn relocate_lamports(
    source_account_info: &AccountInfo,
    destination_account_info: &AccountInfo,
    lamports: u64,
) -> ProgramResult {
    {
        let mut source_lamports = source_account_info.try_borrow_mut_lamports()?;
        *source_lamports = source_lamports
            .checked_sub(lamports)
            .ok_or(ProgramError::InsufficientFunds)?;
    }

    {
        let mut destination_lamports = destination_account_info.try_borrow_mut_lamports()?;
        *destination_lamports = destination_lamports
            .checked_add(lamports)
            .ok_or(ProgramError::ArithmeticOverflow)?;
    }

    Ok(())
}

/// Whether `authority` signed the transaction via any of the instruction's
/// bound accounts.
#[inline]
pub(crate) fn signed_by(accounts: &[AccountInfo], authority: &Pubkey) -> bool {
    accounts
        .iter()
        .any(|account| account.is_signer() && account.key() == authority)
}

#[inline]
pub(crate) fn check_stake_authority(
    accounts: &[AccountInfo],
    staker: &Pubkey,
) -> Result<(), ProgramError> {
    if !signed_by(accounts, staker) {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}

/// The trailing optional lockup authority; when present it must have signed.
pub(crate) fn optional_custodian(
    remaining: &[AccountInfo],
) -> Result<Option<&Pubkey>, ProgramError> {
    match remaining.first() {
        None => Ok(None),
        Some(lockup_authority_info) => {
            if lockup_authority_info.is_signer() {
                Ok(Some(lockup_authority_info.key()))
            } else {
                Err(ProgramError::MissingRequiredSignature)
            }
        }
    }
}
