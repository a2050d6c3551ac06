//! Binary and textual encodings for plans and other serializable values.

pub mod bincode;
pub mod json;
