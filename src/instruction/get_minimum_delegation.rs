use pinocchio::{account_info::AccountInfo, ProgramResult};

pub fn process_get_minimum_delegation(_accounts: &[AccountInfo], _data: &[u8]) -> ProgramResult {
    let minimum_delegation = crate::get_minimum_delegation();
    pinocchio::program::set_return_data(&minimum_delegation.to_le_bytes());
    Ok(())
}
