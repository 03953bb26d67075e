pub mod path_validator;
pub mod process;

pub use path_validator::PathValidator;
