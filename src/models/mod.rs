//! Pod and container data models

mod container;
mod pod;
mod security;

pub use container::*;
pub use pod::*;
pub use security::*;
