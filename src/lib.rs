pub mod config;
pub mod errors;
pub mod filter;
pub mod launch;
pub mod parse;
pub mod report;
pub mod runner;
pub mod types;
