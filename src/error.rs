use pinocchio::program_error::ProgramError;

/// Custom error codes of the stake program.
///
/// The discriminants are part of the wire contract shared with every other
/// validator implementation; variants must never be reordered or renumbered.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeError {
    /// Not enough credits to redeem.
    NoCreditsToRedeem = 0,

    /// Lockup has not yet expired.
    LockupInForce = 1,

    /// Stake already deactivated.
    AlreadyDeactivated = 2,

    /// One re-delegation permitted per epoch.
    TooSoonToRedelegate = 3,

    /// Split amount is more than is staked.
    InsufficientStake = 4,

    /// Stake account with transient stake cannot be merged.
    MergeTransientStake = 5,

    /// Stake account merge failed due to different authority, lockups or
    /// state.
    MergeMismatch = 6,

    /// Custodian address not present.
    CustodianMissing = 7,

    /// Custodian signature not present.
    CustodianSignatureMissing = 8,

    /// Insufficient voting activity in the reference vote account.
    InsufficientReferenceVotes = 9,

    /// Stake account is not delegated to the provided vote account.
    VoteAddressMismatch = 10,

    /// Stake account has not been delinquent for the minimum epochs required
    /// for deactivation.
    MinimumDelinquentEpochsForDeactivationNotMet = 11,

    /// Delegation amount is less than the minimum.
    InsufficientDelegation = 12,

    /// Stake account with transient or inactive stake cannot be redelegated.
    RedelegateTransientOrInactiveStake = 13,

    /// Stake redelegation to the same vote account is not permitted.
    RedelegateToSameVoteAccount = 14,

    /// Redelegated stake must be fully activated before deactivation.
    RedelegatedStakeMustFullyActivateBeforeDeactivationIsPermitted = 15,

    /// Stake action is not permitted while the epoch rewards period is
    /// active.
    EpochRewardsActive = 16,
}

impl From<StakeError> for ProgramError {
    fn from(e: StakeError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_are_stable() {
        // spot-check both ends and the codes other implementations surface
        // most often; a renumbering here is a consensus break
        assert_eq!(StakeError::NoCreditsToRedeem as u32, 0);
        assert_eq!(StakeError::LockupInForce as u32, 1);
        assert_eq!(StakeError::AlreadyDeactivated as u32, 2);
        assert_eq!(StakeError::MergeTransientStake as u32, 5);
        assert_eq!(StakeError::MergeMismatch as u32, 6);
        assert_eq!(StakeError::CustodianMissing as u32, 7);
        assert_eq!(StakeError::InsufficientDelegation as u32, 12);
        assert_eq!(StakeError::EpochRewardsActive as u32, 16);
    }

    #[test]
    fn converts_to_custom_program_error() {
        assert_eq!(
            ProgramError::from(StakeError::VoteAddressMismatch),
            ProgramError::Custom(10)
        );
    }
}
