pub mod bucket;
pub mod catalog;
pub mod listing;
pub mod store;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
