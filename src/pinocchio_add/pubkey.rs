use pinocchio::{
    program_error::ProgramError,
    pubkey::{Pubkey, MAX_SEED_LEN},
};

/// Derive the address `sha256(base, seed, owner)`, the scheme used by
/// seed-addressed authorities.
#[inline]
pub fn create_with_seed(
    base: &Pubkey,
    seed: &[u8],
    owner: &Pubkey,
) -> Result<Pubkey, ProgramError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(ProgramError::MaxSeedLengthExceeded);
    }

    #[cfg(target_os = "solana")]
    {
        let mut bytes = core::mem::MaybeUninit::<[u8; pinocchio::pubkey::PUBKEY_BYTES]>::uninit();

        let vals = &[base, seed, owner];

        let result = unsafe {
            pinocchio::syscalls::sol_sha256(
                vals as *const _ as *const u8,
                vals.len() as u64,
                bytes.as_mut_ptr() as *mut _,
            )
        };

        match result {
            // SAFETY: The syscall has initialized the bytes.
            pinocchio::SUCCESS => Ok(unsafe { bytes.assume_init() }),
            _ => Err(result.into()),
        }
    }

    #[cfg(not(target_os = "solana"))]
    {
        core::hint::black_box((base, seed, owner));
        panic!("create_with_seed is only available on target `solana`")
    }
}
