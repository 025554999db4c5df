/// Additional flags carried alongside a delegation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StakeFlags {
    bits: u8,
}

impl StakeFlags {
    /// Stake must be fully activated before deactivation is permitted.
    ///
    /// Set by redelegation-era flows; no live path in this program sets it,
    /// but the bit assignment is part of the wire contract and flags from
    /// existing accounts survive merges.
    pub const MUST_FULLY_ACTIVATE_BEFORE_DEACTIVATION_IS_PERMITTED: Self = Self { bits: 0b0000_0001 };

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }
}
