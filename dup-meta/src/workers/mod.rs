pub mod base;
pub mod persistence;
