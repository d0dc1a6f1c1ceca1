pub mod payload;
pub mod span;
