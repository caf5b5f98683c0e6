pub mod amount;
pub mod gas;
pub mod tokens;
