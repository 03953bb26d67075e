pub mod backup;
pub mod checker;
pub mod discovery;
pub mod filter;
pub mod identity;

pub mod update;
