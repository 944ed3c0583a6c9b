pub mod dem;
pub mod export;
