#![cfg_attr(not(test), no_std)]

mod entrypoint;

pub mod error;
pub mod instruction;
pub mod pinocchio_add;
pub mod state;

use pinocchio::sysvars::clock::Epoch;

pinocchio_pubkey::declare_id!("Stake11111111111111111111111111111111111111");

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// The warmup/cooldown rate changed from 0.25 to 0.09 long before this
/// program could be deployed, so the new-rate activation epoch is treated as
/// always in the past. Rate resolution still threads the epoch through
/// `state::warmup_cooldown_rate` so the transition arithmetic stays exact.
pub const PERPETUAL_NEW_WARMUP_COOLDOWN_RATE_EPOCH: Option<Epoch> = Some(0);

/// Minimum lamports a delegation must carry, above the rent-exempt reserve.
///
/// The cluster raises this from 1 lamport to 1 SOL by feature activation;
/// a program resolves that at build time.
pub const fn get_minimum_delegation() -> u64 {
    if cfg!(feature = "raise-minimum-delegation-to-1-sol") {
        LAMPORTS_PER_SOL
    } else {
        1
    }
}
