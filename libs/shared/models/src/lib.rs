pub mod error;
pub mod people;
pub mod time;

pub use error::*;
pub use people::*;
pub use time::*;
