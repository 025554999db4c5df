use pinocchio::{program_error::ProgramError, sysvars::clock::Clock};

use crate::{error::StakeError, PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH};

use super::{
    checked_add, Delegation, Meta, Stake, StakeFlags, StakeHistoryGetEntry, StakeStateV2,
};

/// Transient classification of a stake account's ramp state, recomputed on
/// demand for merge/split/move eligibility and never persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeKind {
    /// fully inactive; carries the account's lamport balance
    Inactive(Meta, u64, StakeFlags),
    /// delegated this epoch, nothing effective yet
    ActivationEpoch(Meta, Stake, StakeFlags),
    /// effective with no transient component on either side
    FullyActive(Meta, Stake),
}

impl MergeKind {
    pub fn meta(&self) -> &Meta {
        match self {
            Self::Inactive(meta, _, _) => meta,
            Self::ActivationEpoch(meta, _, _) => meta,
            Self::FullyActive(meta, _) => meta,
        }
    }

    pub fn active_stake(&self) -> Option<&Stake> {
        match self {
            Self::Inactive(_, _, _) => None,
            Self::ActivationEpoch(_, stake, _) => Some(stake),
            Self::FullyActive(_, stake) => Some(stake),
        }
    }

    pub fn get_if_mergeable<T: StakeHistoryGetEntry>(
        stake_state: &StakeStateV2,
        stake_lamports: u64,
        clock: &Clock,
        stake_history: &T,
    ) -> Result<Self, ProgramError> {
        match stake_state {
            StakeStateV2::Stake(meta, stake, stake_flags) => {
                // stake must not be in a transient state, i.e. activating or
                // deactivating with nonzero effective stake
                let status = stake.delegation.stake_activating_and_deactivating(
                    clock.epoch,
                    stake_history,
                    PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH,
                );

                match (status.effective, status.activating, status.deactivating) {
                    (0, 0, 0) => Ok(Self::Inactive(*meta, stake_lamports, *stake_flags)),
                    (0, _, _) => Ok(Self::ActivationEpoch(*meta, *stake, *stake_flags)),
                    (_, 0, 0) => Ok(Self::FullyActive(*meta, *stake)),
                    _ => Err(StakeError::MergeTransientStake.into()),
                }
            }
            StakeStateV2::Initialized(meta) => {
                Ok(Self::Inactive(*meta, stake_lamports, StakeFlags::empty()))
            }
            StakeStateV2::Uninitialized | StakeStateV2::RewardsPool => {
                Err(ProgramError::InvalidAccountData)
            }
        }
    }

    pub fn metas_can_merge(stake: &Meta, source: &Meta, clock: &Clock) -> Result<(), ProgramError> {
        // lockups may mismatch so long as both have expired. the rent-exempt
        // reserve has no bearing on mergeability; the source is culled once
        // the operation succeeds
        let can_merge_lockups = stake.lockup == source.lockup
            || (!stake.lockup.is_in_force(clock, None) && !source.lockup.is_in_force(clock, None));

        if stake.authorized == source.authorized && can_merge_lockups {
            Ok(())
        } else {
            #[cfg(feature = "logging")]
            pinocchio::msg!("Unable to merge due to metadata mismatch");
            Err(StakeError::MergeMismatch.into())
        }
    }

    pub fn active_delegations_can_merge(
        stake: &Delegation,
        source: &Delegation,
    ) -> Result<(), ProgramError> {
        if stake.voter_pubkey != source.voter_pubkey {
            #[cfg(feature = "logging")]
            pinocchio::msg!("Unable to merge due to voter mismatch");
            Err(StakeError::MergeMismatch.into())
        } else if u64::from(stake.deactivation_epoch) == u64::MAX
            && u64::from(source.deactivation_epoch) == u64::MAX
        {
            Ok(())
        } else {
            #[cfg(feature = "logging")]
            pinocchio::msg!("Unable to merge due to stake deactivation");
            Err(StakeError::MergeMismatch.into())
        }
    }

    /// Combine `source` into `self`, returning the destination's new state,
    /// or `None` when only lamports move.
    pub fn merge(
        self,
        source: Self,
        clock: &Clock,
    ) -> Result<Option<StakeStateV2>, ProgramError> {
        Self::metas_can_merge(self.meta(), source.meta(), clock)?;
        self.active_stake()
            .zip(source.active_stake())
            .map(|(stake, source)| {
                Self::active_delegations_can_merge(&stake.delegation, &source.delegation)
            })
            .unwrap_or(Ok(()))?;

        let merged_state = match (self, source) {
            (Self::Inactive(_, _, _), Self::Inactive(_, _, _)) => None,
            (Self::Inactive(_, _, _), Self::ActivationEpoch(_, _, _)) => None,
            (
                Self::ActivationEpoch(meta, mut stake, stake_flags),
                Self::Inactive(_, source_lamports, source_stake_flags),
            ) => {
                stake.delegation.stake =
                    checked_add(u64::from(stake.delegation.stake), source_lamports)?.into();
                Some(StakeStateV2::Stake(
                    meta,
                    stake,
                    stake_flags.union(source_stake_flags),
                ))
            }
            (
                Self::ActivationEpoch(meta, mut stake, stake_flags),
                Self::ActivationEpoch(source_meta, source_stake, source_stake_flags),
            ) => {
                let source_lamports = checked_add(
                    u64::from(source_meta.rent_exempt_reserve),
                    u64::from(source_stake.delegation.stake),
                )?;
                merge_delegation_stake_and_credits_observed(
                    &mut stake,
                    source_lamports,
                    source_stake.credits_observed.into(),
                )?;
                Some(StakeStateV2::Stake(
                    meta,
                    stake,
                    stake_flags.union(source_stake_flags),
                ))
            }
            (Self::FullyActive(meta, mut stake), Self::FullyActive(_, source_stake)) => {
                // don't stake the source account's rent-exempt reserve, to
                // protect against the magic activation loophole; it moves
                // into the destination as extra withdrawable lamports
                merge_delegation_stake_and_credits_observed(
                    &mut stake,
                    source_stake.delegation.stake.into(),
                    source_stake.credits_observed.into(),
                )?;
                Some(StakeStateV2::Stake(meta, stake, StakeFlags::empty()))
            }
            _ => return Err(StakeError::MergeMismatch.into()),
        };
        Ok(merged_state)
    }
}

pub(crate) fn merge_delegation_stake_and_credits_observed(
    stake: &mut Stake,
    absorbed_lamports: u64,
    absorbed_credits_observed: u64,
) -> Result<(), ProgramError> {
    let credits_observed =
        stake_weighted_credits_observed(stake, absorbed_lamports, absorbed_credits_observed)
            .ok_or(ProgramError::ArithmeticOverflow)?;

    stake.credits_observed = credits_observed.into();
    stake.delegation.stake =
        checked_add(u64::from(stake.delegation.stake), absorbed_lamports)?.into();
    Ok(())
}

/// Stake-weighted average of the two credits-observed values, in u128 so the
/// products cannot overflow, rounded up by adding `denominator - 1` to the
/// numerator; fractional credits must not be minted by a merge.
fn stake_weighted_credits_observed(
    stake: &Stake,
    absorbed_lamports: u64,
    absorbed_credits_observed: u64,
) -> Option<u64> {
    let credits_observed = u64::from(stake.credits_observed);
    if credits_observed == absorbed_credits_observed {
        Some(credits_observed)
    } else {
        let total_stake =
            u128::from(u64::from(stake.delegation.stake).checked_add(absorbed_lamports)?);
        let stake_weighted_credits =
            u128::from(credits_observed).checked_mul(u128::from(u64::from(stake.delegation.stake)))?;
        let absorbed_weighted_credits =
            u128::from(absorbed_credits_observed).checked_mul(u128::from(absorbed_lamports))?;
        let total_weighted_credits = stake_weighted_credits
            .checked_add(absorbed_weighted_credits)?
            .checked_add(total_stake)?
            .checked_sub(1)?;
        u64::try_from(total_weighted_credits.checked_div(total_stake)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::stake_history::fixtures::HistoryFixture;
    use crate::state::StakeHistoryEntry;
    use assert_matches::assert_matches;
    use test_case::test_case;

    const VOTER_A: [u8; 32] = [10; 32];
    const VOTER_B: [u8; 32] = [11; 32];

    fn clock(epoch: u64) -> Clock {
        Clock {
            slot: 0,
            epoch_start_timestamp: 0,
            epoch,
            leader_schedule_epoch: 0,
            unix_timestamp: 0,
        }
    }

    fn meta(reserve: u64) -> Meta {
        Meta {
            rent_exempt_reserve: reserve.into(),
            ..Meta::default()
        }
    }

    fn stake(voter: [u8; 32], amount: u64, activation_epoch: u64, credits: u64) -> Stake {
        Stake {
            delegation: Delegation::new(&voter, amount, activation_epoch),
            credits_observed: credits.into(),
        }
    }

    /// History where warmups complete in a single epoch.
    fn absorbing_history() -> HistoryFixture {
        HistoryFixture::new(
            (0..100)
                .map(|epoch| {
                    (
                        epoch,
                        StakeHistoryEntry {
                            effective: 1_000_000_000_000,
                            activating: 1,
                            deactivating: 1,
                        },
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn classifies_initialized_as_inactive() {
        let history = absorbing_history();
        let state = StakeStateV2::Initialized(meta(100));
        let kind = MergeKind::get_if_mergeable(&state, 5_000, &clock(10), &history).unwrap();
        assert_eq!(kind, MergeKind::Inactive(meta(100), 5_000, StakeFlags::empty()));
    }

    #[test_case(StakeStateV2::Uninitialized; "uninitialized")]
    #[test_case(StakeStateV2::RewardsPool; "rewards pool")]
    fn refuses_to_classify(state: StakeStateV2) {
        let history = absorbing_history();
        assert_eq!(
            MergeKind::get_if_mergeable(&state, 5_000, &clock(10), &history),
            Err(ProgramError::InvalidAccountData)
        );
    }

    #[test]
    fn classifies_by_ramp_position() {
        let history = absorbing_history();
        let m = meta(100);
        let s = stake(VOTER_A, 1_000, 10, 0);

        // activation epoch: nothing effective yet
        let kind = MergeKind::get_if_mergeable(
            &StakeStateV2::Stake(m, s, StakeFlags::empty()),
            5_000,
            &clock(10),
            &history,
        )
        .unwrap();
        assert_eq!(kind, MergeKind::ActivationEpoch(m, s, StakeFlags::empty()));

        // one epoch later the absorbing history has it fully active
        let kind = MergeKind::get_if_mergeable(
            &StakeStateV2::Stake(m, s, StakeFlags::empty()),
            5_000,
            &clock(11),
            &history,
        )
        .unwrap();
        assert_matches!(kind, MergeKind::FullyActive(_, _));

        // deactivated long ago: inactive again
        let mut cooled = s;
        cooled.delegation.deactivation_epoch = 12u64.into();
        let kind = MergeKind::get_if_mergeable(
            &StakeStateV2::Stake(m, cooled, StakeFlags::empty()),
            5_000,
            &clock(14),
            &history,
        )
        .unwrap();
        assert_matches!(kind, MergeKind::Inactive(_, 5_000, _));

        // mid-cooldown is transient
        let mut cooling = s;
        cooling.delegation.deactivation_epoch = 14u64.into();
        assert_eq!(
            MergeKind::get_if_mergeable(
                &StakeStateV2::Stake(m, cooling, StakeFlags::empty()),
                5_000,
                &clock(14),
                &history,
            ),
            Err(StakeError::MergeTransientStake.into())
        );
    }

    #[test]
    fn metas_merge_on_equal_or_expired_lockups() {
        let c = clock(10);
        let expired = meta(100);
        let mut locked = meta(100);
        locked.lockup.epoch = 20u64.into();

        assert!(MergeKind::metas_can_merge(&expired, &expired, &c).is_ok());
        assert!(MergeKind::metas_can_merge(&locked, &locked, &c).is_ok());
        assert_eq!(
            MergeKind::metas_can_merge(&locked, &expired, &c),
            Err(StakeError::MergeMismatch.into())
        );
        // identical but for authority: never mergeable
        let mut foreign = expired;
        foreign.authorized.staker = [9; 32];
        assert_eq!(
            MergeKind::metas_can_merge(&expired, &foreign, &c),
            Err(StakeError::MergeMismatch.into())
        );
    }

    #[test]
    fn fully_active_voter_mismatch_rejects_both_ways() {
        let c = clock(20);
        let a = MergeKind::FullyActive(meta(100), stake(VOTER_A, 1_000, 10, 5));
        let b = MergeKind::FullyActive(meta(100), stake(VOTER_B, 2_000, 10, 5));

        assert_eq!(
            a.clone().merge(b.clone(), &c),
            Err(StakeError::MergeMismatch.into())
        );
        assert_eq!(b.merge(a, &c), Err(StakeError::MergeMismatch.into()));
    }

    #[test]
    fn deactivating_delegations_cannot_merge() {
        let mut cooled = stake(VOTER_A, 1_000, 10, 5);
        cooled.delegation.deactivation_epoch = 30u64.into();
        assert_eq!(
            MergeKind::active_delegations_can_merge(
                &stake(VOTER_A, 1_000, 10, 5).delegation,
                &cooled.delegation,
            ),
            Err(StakeError::MergeMismatch.into())
        );
    }

    #[test]
    fn inactive_pairs_move_only_lamports() {
        let c = clock(10);
        let inactive = || MergeKind::Inactive(meta(100), 5_000, StakeFlags::empty());
        let activating =
            MergeKind::ActivationEpoch(meta(100), stake(VOTER_A, 1_000, 10, 0), StakeFlags::empty());

        assert_eq!(inactive().merge(inactive(), &c).unwrap(), None);
        assert_eq!(inactive().merge(activating, &c).unwrap(), None);
    }

    #[test]
    fn activation_epoch_absorbs_inactive_lamports() {
        let c = clock(10);
        let dst =
            MergeKind::ActivationEpoch(meta(100), stake(VOTER_A, 1_000, 10, 0), StakeFlags::empty());
        let src = MergeKind::Inactive(meta(100), 5_000, StakeFlags::empty());

        let merged = dst.merge(src, &c).unwrap().unwrap();
        let StakeStateV2::Stake(_, stake, _) = merged else {
            panic!("expected stake state");
        };
        assert_eq!(u64::from(stake.delegation.stake), 6_000);
    }

    #[test]
    fn activation_epoch_pair_absorbs_source_reserve() {
        let c = clock(10);
        let dst =
            MergeKind::ActivationEpoch(meta(100), stake(VOTER_A, 1_000, 10, 7), StakeFlags::empty());
        let src =
            MergeKind::ActivationEpoch(meta(300), stake(VOTER_A, 2_000, 10, 7), StakeFlags::empty());

        let merged = dst.merge(src, &c).unwrap().unwrap();
        let StakeStateV2::Stake(merged_meta, stake, _) = merged else {
            panic!("expected stake state");
        };
        // destination meta wins; source stake plus source reserve absorbed
        assert_eq!(u64::from(merged_meta.rent_exempt_reserve), 100);
        assert_eq!(u64::from(stake.delegation.stake), 1_000 + 2_000 + 300);
        assert_eq!(u64::from(stake.credits_observed), 7);
    }

    #[test]
    fn fully_active_pair_excludes_source_reserve() {
        let c = clock(20);
        let dst = MergeKind::FullyActive(meta(100), stake(VOTER_A, 1_000, 10, 10));
        let src = MergeKind::FullyActive(meta(300), stake(VOTER_A, 3_000, 10, 10));

        let merged = dst.merge(src, &c).unwrap().unwrap();
        let StakeStateV2::Stake(_, stake, flags) = merged else {
            panic!("expected stake state");
        };
        assert_eq!(u64::from(stake.delegation.stake), 4_000);
        assert_eq!(flags, StakeFlags::empty());
    }

    #[test]
    fn mismatched_shapes_reject() {
        let c = clock(20);
        let dst = MergeKind::FullyActive(meta(100), stake(VOTER_A, 1_000, 10, 10));
        let src =
            MergeKind::ActivationEpoch(meta(100), stake(VOTER_A, 2_000, 19, 0), StakeFlags::empty());
        assert_eq!(
            dst.merge(src, &c),
            Err(StakeError::MergeMismatch.into())
        );
    }

    #[test]
    fn credits_average_is_stake_weighted_and_rounds_up() {
        let mut dst = stake(VOTER_A, 100, 10, 10);
        // equal credits stay put
        merge_delegation_stake_and_credits_observed(&mut dst, 900, 10).unwrap();
        assert_eq!(u64::from(dst.credits_observed), 10);
        assert_eq!(u64::from(dst.delegation.stake), 1_000);

        // (1000*10 + 500*20) / 1500 = 13.33, rounded up to 14
        let mut dst = stake(VOTER_A, 1_000, 10, 10);
        merge_delegation_stake_and_credits_observed(&mut dst, 500, 20).unwrap();
        assert_eq!(u64::from(dst.credits_observed), 14);
        assert_eq!(u64::from(dst.delegation.stake), 1_500);

        // an exact average stays exact
        let mut dst = stake(VOTER_A, 1_000, 10, 10);
        merge_delegation_stake_and_credits_observed(&mut dst, 1_000, 20).unwrap();
        assert_eq!(u64::from(dst.credits_observed), 15);
        assert_eq!(u64::from(dst.delegation.stake), 2_000);
    }

    #[test]
    fn credits_combination_overflow_is_an_error() {
        let mut dst = stake(VOTER_A, u64::MAX - 1, 10, 10);
        assert_eq!(
            merge_delegation_stake_and_credits_observed(&mut dst, u64::MAX - 1, 20),
            Err(ProgramError::ArithmeticOverflow)
        );
    }
}
