//! Account queries
//!
//! - **reader**: chunked, order-preserving reads of known addresses
//! - **scanner**: filtered scans over a program's accounts
//! - **filter**: normalisation of equality filter values to raw bytes

mod filter;
mod reader;
mod scanner;

pub use filter::FilterValue;
pub use reader::{BatchedAccountReader, FetchedAccount, LazyAccountQuery};
pub use scanner::{address_from_data, ProgramAccountScanner, ScannedAccount};
