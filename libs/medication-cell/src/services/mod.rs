pub mod adherence;
pub mod store;

pub use adherence::*;
pub use store::*;
