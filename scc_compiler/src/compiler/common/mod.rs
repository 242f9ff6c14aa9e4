pub mod error;
pub mod symbol_table;
pub mod token;
