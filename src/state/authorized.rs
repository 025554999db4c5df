use pinocchio::{program_error::ProgramError, pubkey::Pubkey, sysvars::clock::Clock};

use crate::error::StakeError;

use super::Lockup;

#[repr(C)]
#[derive(Default, Debug, PartialEq, Clone, Copy)]
pub struct Authorized {
    pub staker: Pubkey,
    pub withdrawer: Pubkey,
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StakeAuthorize {
    Staker = 0,
    Withdrawer = 1,
}

/// Which of the relevant authorities signed the enclosing transaction,
/// collected by the processor from the instruction's bound accounts.
pub struct AuthorizeSignerArgs {
    pub has_custodian_signer: bool,
    pub has_staker_signer: bool,
    pub has_withdrawer_signer: bool,
}

impl Authorized {
    pub fn authorize(
        &mut self,
        signer_args: AuthorizeSignerArgs,
        new_authorized: &Pubkey,
        stake_authorize: StakeAuthorize,
        lockup_custodian_args: (&Lockup, &Clock, Option<&Pubkey>),
    ) -> Result<(), ProgramError> {
        match stake_authorize {
            StakeAuthorize::Staker => {
                // either the staker or the withdrawer may rotate the staker
                if !signer_args.has_staker_signer && !signer_args.has_withdrawer_signer {
                    return Err(ProgramError::MissingRequiredSignature);
                }
                self.staker = *new_authorized
            }
            StakeAuthorize::Withdrawer => {
                let (lockup, clock, custodian) = lockup_custodian_args;
                if lockup.is_in_force(clock, None) {
                    match custodian {
                        None => return Err(StakeError::CustodianMissing.into()),
                        Some(custodian) => {
                            if !signer_args.has_custodian_signer {
                                return Err(StakeError::CustodianSignatureMissing.into());
                            }
                            if lockup.is_in_force(clock, Some(custodian)) {
                                return Err(StakeError::LockupInForce.into());
                            }
                        }
                    }
                }
                if !signer_args.has_withdrawer_signer {
                    return Err(ProgramError::MissingRequiredSignature);
                }
                self.withdrawer = *new_authorized
            }
        }
        Ok(())
    }
}
