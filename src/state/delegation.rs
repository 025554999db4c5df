use pinocchio::{pubkey::Pubkey, sysvars::clock};

use super::{Epoch, PodF64, PodU64, StakeHistoryEntry, StakeHistoryGetEntry, MAX_ENTRIES};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Delegation {
    /// to whom the stake is delegated
    pub voter_pubkey: Pubkey,
    /// activated stake amount, set at delegate() time
    pub stake: PodU64,
    /// epoch at which this stake was activated, Epoch::MAX if is a bootstrap stake
    pub activation_epoch: Epoch,
    /// epoch the stake was deactivated, Epoch::MAX if not deactivated
    pub deactivation_epoch: Epoch,
    /// retained for wire compatibility; rate resolution goes through
    /// `warmup_cooldown_rate` instead of this field
    pub warmup_cooldown_rate: PodF64,
}

pub const DEFAULT_WARMUP_COOLDOWN_RATE: f64 = 0.25;
pub const NEW_WARMUP_COOLDOWN_RATE: f64 = 0.09;

impl Default for Delegation {
    fn default() -> Self {
        Self {
            voter_pubkey: Pubkey::default(),
            stake: 0u64.into(),
            activation_epoch: 0u64.into(),
            deactivation_epoch: u64::MAX.into(),
            warmup_cooldown_rate: DEFAULT_WARMUP_COOLDOWN_RATE.into(),
        }
    }
}

impl Delegation {
    pub fn new(voter_pubkey: &Pubkey, stake: u64, activation_epoch: clock::Epoch) -> Self {
        Self {
            voter_pubkey: *voter_pubkey,
            stake: stake.into(),
            activation_epoch: activation_epoch.into(),
            ..Self::default()
        }
    }

    pub fn stake_activating_and_deactivating<T: StakeHistoryGetEntry>(
        &self,
        target_epoch: clock::Epoch,
        history: &T,
        new_rate_activation_epoch: Option<clock::Epoch>,
    ) -> StakeHistoryEntry {
        // first, calculate an effective and activating stake
        let (effective_stake, activating_stake) =
            self.stake_and_activating(target_epoch, history, new_rate_activation_epoch);

        let deactivation_epoch = self.deactivation_epoch.into();

        // then de-activate some portion if necessary
        if target_epoch < deactivation_epoch {
            // not deactivated
            if activating_stake == 0 {
                StakeHistoryEntry::with_effective(effective_stake)
            } else {
                StakeHistoryEntry::with_effective_and_activating(effective_stake, activating_stake)
            }
        } else if target_epoch == deactivation_epoch {
            // can only deactivate what's activated
            StakeHistoryEntry::with_deactivating(effective_stake)
        } else if let Some((mut prev_epoch, mut prev_cluster_stake)) = history
            .get_entry(deactivation_epoch)
            .map(|cluster_stake_at_deactivation_epoch| {
                (deactivation_epoch, cluster_stake_at_deactivation_epoch)
            })
        {
            // target_epoch > self.deactivation_epoch

            // loop from the deactivation epoch until the target epoch;
            // current effective stake is updated using its previous epoch's
            // cluster stake. the window holds at most MAX_ENTRIES epochs, so
            // the loop is capped there against a pathological history
            let mut current_effective_stake = effective_stake;
            for _ in 0..MAX_ENTRIES {
                let current_epoch = prev_epoch + 1;
                // if there is no deactivating stake at prev epoch, we should
                // have been fully undelegated at this moment
                if prev_cluster_stake.deactivating == 0 {
                    break;
                }

                // I'm trying to get to zero, how much of the deactivation in
                // stake this account is entitled to take
                let weight =
                    current_effective_stake as f64 / prev_cluster_stake.deactivating as f64;
                let warmup_cooldown_rate =
                    warmup_cooldown_rate(current_epoch, new_rate_activation_epoch);

                // portion of newly not-effective cluster stake I'm entitled
                // to at current epoch
                let newly_not_effective_cluster_stake =
                    prev_cluster_stake.effective as f64 * warmup_cooldown_rate;
                let newly_not_effective_stake =
                    ((weight * newly_not_effective_cluster_stake) as u64).max(1);

                current_effective_stake =
                    current_effective_stake.saturating_sub(newly_not_effective_stake);
                if current_effective_stake == 0 {
                    break;
                }

                if current_epoch >= target_epoch {
                    break;
                }
                if let Some(current_cluster_stake) = history.get_entry(current_epoch) {
                    prev_epoch = current_epoch;
                    prev_cluster_stake = current_cluster_stake;
                } else {
                    break;
                }
            }

            // deactivating stake should equal to all of currently remaining
            // effective stake
            StakeHistoryEntry::with_deactivating(current_effective_stake)
        } else {
            // no history or I've dropped out of history, so assume fully deactivated
            StakeHistoryEntry::default()
        }
    }

    // returned tuple is (effective, activating) stake
    fn stake_and_activating<T: StakeHistoryGetEntry>(
        &self,
        target_epoch: clock::Epoch,
        history: &T,
        new_rate_activation_epoch: Option<clock::Epoch>,
    ) -> (u64, u64) {
        let delegated_stake = self.stake.into();
        let activation_epoch = self.activation_epoch.into();
        let deactivation_epoch = self.deactivation_epoch.into();

        if self.is_bootstrap() {
            // fully effective immediately
            (delegated_stake, 0)
        } else if self.activation_epoch == self.deactivation_epoch {
            // activated but instantly deactivated; no stake at all regardless
            // of target_epoch. this must be after the bootstrap check and
            // before the all-is-activating check
            (0, 0)
        } else if target_epoch == activation_epoch {
            // all is activating
            (0, delegated_stake)
        } else if target_epoch < activation_epoch {
            // not yet enabled
            (0, 0)
        } else if let Some((mut prev_epoch, mut prev_cluster_stake)) = history
            .get_entry(activation_epoch)
            .map(|cluster_stake_at_activation_epoch| {
                (activation_epoch, cluster_stake_at_activation_epoch)
            })
        {
            // target_epoch > self.activation_epoch

            // loop from the activation epoch until the target epoch summing
            // up this delegation's entitlement; bounded as in the cooldown
            // loop above
            let mut current_effective_stake = 0;
            for _ in 0..MAX_ENTRIES {
                let current_epoch = prev_epoch + 1;
                // if there is no activating stake at prev epoch, we should
                // have been fully effective at this moment
                if prev_cluster_stake.activating == 0 {
                    break;
                }

                // how much of the growth in stake this account is entitled
                // to take
                let remaining_activating_stake = delegated_stake - current_effective_stake;
                let weight =
                    remaining_activating_stake as f64 / prev_cluster_stake.activating as f64;
                let warmup_cooldown_rate =
                    warmup_cooldown_rate(current_epoch, new_rate_activation_epoch);

                // portion of newly effective cluster stake I'm entitled to
                // at current epoch
                let newly_effective_cluster_stake =
                    prev_cluster_stake.effective as f64 * warmup_cooldown_rate;
                let newly_effective_stake =
                    ((weight * newly_effective_cluster_stake) as u64).max(1);

                current_effective_stake += newly_effective_stake;
                if current_effective_stake >= delegated_stake {
                    current_effective_stake = delegated_stake;
                    break;
                }

                if current_epoch >= target_epoch || current_epoch >= deactivation_epoch {
                    break;
                }
                if let Some(current_cluster_stake) = history.get_entry(current_epoch) {
                    prev_epoch = current_epoch;
                    prev_cluster_stake = current_cluster_stake;
                } else {
                    break;
                }
            }

            (
                current_effective_stake,
                delegated_stake - current_effective_stake,
            )
        } else {
            // no history or I've dropped out of history, so assume fully effective
            (delegated_stake, 0)
        }
    }

    /// Effective stake alone, for callers that don't care about the
    /// transient components.
    pub fn effective_stake<T: StakeHistoryGetEntry>(
        &self,
        target_epoch: clock::Epoch,
        history: &T,
        new_rate_activation_epoch: Option<clock::Epoch>,
    ) -> u64 {
        self.stake_activating_and_deactivating(target_epoch, history, new_rate_activation_epoch)
            .effective
    }

    #[inline]
    fn is_bootstrap(&self) -> bool {
        u64::from(self.activation_epoch) == u64::MAX
    }
}

pub fn warmup_cooldown_rate(
    current_epoch: clock::Epoch,
    new_rate_activation_epoch: Option<clock::Epoch>,
) -> f64 {
    if current_epoch < new_rate_activation_epoch.unwrap_or(u64::MAX) {
        DEFAULT_WARMUP_COOLDOWN_RATE
    } else {
        NEW_WARMUP_COOLDOWN_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::stake_history::fixtures::HistoryFixture;
    use proptest::prelude::*;

    fn delegation(stake: u64, activation_epoch: u64, deactivation_epoch: u64) -> Delegation {
        Delegation {
            stake: stake.into(),
            activation_epoch: activation_epoch.into(),
            deactivation_epoch: deactivation_epoch.into(),
            ..Delegation::default()
        }
    }

    fn entry(effective: u64, activating: u64, deactivating: u64) -> StakeHistoryEntry {
        StakeHistoryEntry {
            effective,
            activating,
            deactivating,
        }
    }

    /// A cluster warming up and cooling down a steady tenth of the stake
    /// pool every epoch, long enough to carry any single delegation through
    /// its full ramp.
    fn steady_history() -> HistoryFixture {
        HistoryFixture::new(
            (0..200)
                .map(|epoch| {
                    (
                        epoch,
                        entry(1_000_000_000_000_000, 100_000_000_000_000, 100_000_000_000_000),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn warmup_entitlement_first_epoch() {
        let history = HistoryFixture::new(vec![(10, entry(2_000_000, 4_000_000, 0))]);
        let delegation = delegation(1_000_000, 10, u64::MAX);

        let (effective, activating) = delegation.stake_and_activating(11, &history, None);
        // weight 0.25 against 500_000 newly effective cluster stake
        assert_eq!(effective, 125_000);
        assert_eq!(activating, 875_000);
    }

    #[test]
    fn activation_epoch_is_all_activating() {
        let history = HistoryFixture::new(vec![(10, entry(2_000_000, 4_000_000, 0))]);
        let delegation = delegation(1_000_000, 10, u64::MAX);

        let status = delegation.stake_activating_and_deactivating(10, &history, None);
        assert_eq!(status, entry(0, 1_000_000, 0));

        let status = delegation.stake_activating_and_deactivating(9, &history, None);
        assert_eq!(status, entry(0, 0, 0));
    }

    #[test]
    fn bootstrap_is_always_fully_effective() {
        let history = HistoryFixture::new(vec![]);
        let delegation = delegation(1_000_000, u64::MAX, u64::MAX);

        for target_epoch in [0, 1, 100, u64::MAX - 1] {
            let (effective, activating) =
                delegation.stake_and_activating(target_epoch, &history, None);
            assert_eq!(effective, 1_000_000);
            assert_eq!(activating, 0);
        }
    }

    #[test]
    fn instant_deactivation_never_counts() {
        let history = steady_history();
        let delegation = delegation(1_000_000, 10, 10);

        for target_epoch in [9, 10, 11, 100] {
            let status = delegation.stake_activating_and_deactivating(target_epoch, &history, None);
            assert_eq!(status, entry(0, 0, 0));
        }
    }

    #[test]
    fn missing_activation_history_assumes_fully_effective() {
        let history = HistoryFixture::new(vec![]);
        let delegation = delegation(1_000_000, 10, u64::MAX);

        let (effective, activating) = delegation.stake_and_activating(20, &history, None);
        assert_eq!((effective, activating), (1_000_000, 0));
    }

    #[test]
    fn missing_deactivation_history_assumes_fully_deactivated() {
        // the mirror-image default of the activation case, deliberately
        // asymmetric: unknown activation counts in full, unknown
        // deactivation counts as gone
        let history = HistoryFixture::new(vec![]);
        let delegation = delegation(1_000_000, 10, 15);

        let status = delegation.stake_activating_and_deactivating(20, &history, None);
        assert_eq!(status, entry(0, 0, 0));
    }

    #[test]
    fn deactivation_epoch_cools_the_whole_effective_amount() {
        let history = steady_history();
        let delegation = delegation(1_000_000, 10, 50);

        let effective_before = delegation.effective_stake(49, &history, None);
        assert_eq!(effective_before, 1_000_000);

        let status = delegation.stake_activating_and_deactivating(50, &history, None);
        assert_eq!(status.effective, 1_000_000);
        assert_eq!(status.activating, 0);
        assert_eq!(status.deactivating, 1_000_000);
    }

    #[test]
    fn minimum_one_lamport_moves_per_epoch() {
        // a cluster so large the weighted share rounds to zero; the floor of
        // one lamport per epoch still drives the ramp forward
        let history = HistoryFixture::new(
            (10..20)
                .map(|epoch| (epoch, entry(u64::MAX / 2, u64::MAX / 2, 0)))
                .collect(),
        );
        let delegation = delegation(5, 10, u64::MAX);

        let (effective, activating) = delegation.stake_and_activating(13, &history, None);
        assert_eq!(effective, 3);
        assert_eq!(activating, 2);

        let (effective, activating) = delegation.stake_and_activating(19, &history, None);
        assert_eq!(effective, 5);
        assert_eq!(activating, 0);
    }

    #[test]
    fn new_rate_slows_the_ramp() {
        let history = HistoryFixture::new(vec![(10, entry(2_000_000, 4_000_000, 0))]);
        let delegation = delegation(1_000_000, 10, u64::MAX);

        let (old_rate_effective, _) = delegation.stake_and_activating(11, &history, None);
        let (new_rate_effective, _) = delegation.stake_and_activating(11, &history, Some(0));

        // 0.25 vs 0.09 of the same newly effective cluster stake
        assert_eq!(old_rate_effective, 125_000);
        assert_eq!(new_rate_effective, 45_000);
    }

    #[test]
    fn rate_switches_at_the_activation_boundary() {
        assert_eq!(warmup_cooldown_rate(5, None), DEFAULT_WARMUP_COOLDOWN_RATE);
        assert_eq!(warmup_cooldown_rate(5, Some(6)), DEFAULT_WARMUP_COOLDOWN_RATE);
        assert_eq!(warmup_cooldown_rate(6, Some(6)), NEW_WARMUP_COOLDOWN_RATE);
        assert_eq!(warmup_cooldown_rate(7, Some(6)), NEW_WARMUP_COOLDOWN_RATE);
    }

    #[test]
    fn pathological_history_terminates() {
        // a history that answers every epoch would otherwise let the walk
        // run until the target; the iteration cap stops it at the window
        // size
        struct EndlessHistory;
        impl StakeHistoryGetEntry for EndlessHistory {
            fn get_entry(&self, _target_epoch: u64) -> Option<StakeHistoryEntry> {
                Some(StakeHistoryEntry {
                    effective: u64::MAX / 2,
                    activating: u64::MAX / 2,
                    deactivating: 0,
                })
            }
        }

        let delegation = delegation(u64::MAX / 4, 0, u64::MAX);
        let (effective, activating) =
            delegation.stake_and_activating(u64::MAX - 1, &EndlessHistory, None);
        // one floor lamport per simulated epoch, capped at the window size
        assert_eq!(effective, MAX_ENTRIES as u64);
        assert_eq!(activating, u64::MAX / 4 - effective);
    }

    proptest! {
        #[test]
        fn effective_stake_is_bounded_by_delegation(
            stake in 1u64..=1_000_000_000_000,
            activation_epoch in 0u64..100,
            target_epoch in 0u64..250,
        ) {
            let history = steady_history();
            let delegation = delegation(stake, activation_epoch, u64::MAX);
            let status =
                delegation.stake_activating_and_deactivating(target_epoch, &history, None);
            prop_assert!(status.effective <= stake);
            prop_assert!(status.activating <= stake);
            prop_assert_eq!(status.deactivating, 0);
        }

        #[test]
        fn warmup_is_monotonic_and_cooldown_reverses(
            stake in 1u64..=1_000_000_000_000,
            activation_epoch in 0u64..50,
            deactivation_delta in 1u64..50,
        ) {
            let history = steady_history();
            let deactivation_epoch = activation_epoch + deactivation_delta;
            let delegation = delegation(stake, activation_epoch, deactivation_epoch);

            let mut prev_effective = 0u64;
            for target_epoch in activation_epoch..deactivation_epoch {
                let effective = delegation.effective_stake(target_epoch, &history, None);
                prop_assert!(effective >= prev_effective);
                prop_assert!(effective <= stake);
                prev_effective = effective;
            }

            let mut prev_effective = u64::MAX;
            for target_epoch in deactivation_epoch..deactivation_epoch + 60 {
                let status =
                    delegation.stake_activating_and_deactivating(target_epoch, &history, None);
                prop_assert_eq!(status.activating, 0);
                prop_assert_eq!(status.effective, status.deactivating);
                prop_assert!(status.effective <= prev_effective);
                prev_effective = status.effective;
            }
        }
    }
}
