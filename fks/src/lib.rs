#![doc = include_str!("../README.md")]

pub mod prime;
pub mod stats;

mod universal;
pub use universal::UniversalHash;

mod conf;
pub use conf::BuildConf;

mod error;
pub use error::BuildError;

mod table;
pub use table::{PerfectHashTable, SPACE_FACTOR};

pub use dyn_size_of::GetSize;
