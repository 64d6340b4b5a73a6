//! Input readers

pub mod cof;

pub use cof::CofReader;
