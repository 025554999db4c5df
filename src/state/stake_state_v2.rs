use pinocchio::{
    account_info::{AccountInfo, Ref, RefMut},
    program_error::ProgramError,
};

use super::{Meta, Stake, StakeFlags};

/// The tagged state stored in every stake account.
///
/// Exactly one variant is live at a time; transition functions read the
/// current variant, validate, and overwrite with the replacement in place.
/// `RewardsPool` is reserved and never produced by this program.
#[repr(u32)]
#[derive(Debug, Default, PartialEq)]
pub enum StakeStateV2 {
    #[default]
    Uninitialized = 0,
    Initialized(Meta) = 1,
    Stake(Meta, Stake, StakeFlags) = 2,
    RewardsPool = 3,
}

impl StakeStateV2 {
    /// The fixed number of bytes used to serialize each stake account
    pub const fn size_of() -> usize {
        200
    }

    #[inline]
    fn check_data(data: &[u8]) -> Result<(), ProgramError> {
        let discriminant = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if discriminant > 3 {
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(())
    }

    /// Borrow the state shared from the account data.
    ///
    /// The borrow fails immediately if the underlying record is already
    /// exclusively borrowed, including through an aliasing account index.
    #[inline]
    pub fn from_account_info(
        account_info: &AccountInfo,
    ) -> Result<Ref<StakeStateV2>, ProgramError> {
        if account_info.data_len() < Self::size_of() {
            return Err(ProgramError::InvalidAccountData);
        }

        let data = account_info.try_borrow_data()?;
        Self::check_data(&data)?;

        Ok(Ref::map(data, |data| unsafe { Self::from_bytes(data) }))
    }

    /// Borrow the state exclusively for decode-modify-encode.
    #[inline]
    pub fn from_account_info_mut(
        account_info: &AccountInfo,
    ) -> Result<RefMut<StakeStateV2>, ProgramError> {
        if account_info.data_len() < Self::size_of() {
            return Err(ProgramError::AccountDataTooSmall);
        }

        let data = account_info.try_borrow_mut_data()?;
        Self::check_data(&data)?;

        Ok(RefMut::map(data, |data| unsafe {
            Self::from_bytes_mut(data)
        }))
    }

    /// # Safety
    ///
    /// The caller must ensure that `bytes` holds a valid serialized state
    /// and lives at least as long as the returned reference.
    #[inline(always)]
    pub unsafe fn from_bytes(bytes: &[u8]) -> &Self {
        &*(bytes.as_ptr() as *const Self)
    }

    /// # Safety
    ///
    /// As [`Self::from_bytes`], plus the caller must guarantee exclusive
    /// access for the lifetime of the returned reference.
    #[inline(always)]
    pub unsafe fn from_bytes_mut(bytes: &mut [u8]) -> &mut Self {
        &mut *(bytes.as_mut_ptr() as *mut Self)
    }
}
