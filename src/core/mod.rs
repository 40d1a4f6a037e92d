pub mod cache;
pub mod identity;
pub mod options;
pub mod types;
pub mod verdict;
