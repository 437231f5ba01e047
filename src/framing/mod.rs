pub mod dap;
pub mod sentinel;
