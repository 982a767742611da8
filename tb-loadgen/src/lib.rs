#![deny(rust_2018_idioms)]
#![deny(clippy::correctness)]
#![deny(clippy::perf)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod generator;
pub mod ledger;
pub mod replay;
pub mod transaction;
