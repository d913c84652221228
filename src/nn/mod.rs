//! Network modules owned by a parameter group.

pub mod alpha;
pub mod mlp;
