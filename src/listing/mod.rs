pub mod columns;
pub mod table;

pub use table::{extract, Listing};
