// Shared by several test binaries, each one uses a different part
#![allow(dead_code)]

pub mod mock_ledger;

pub use mock_ledger::{MockConnector, MockNetwork};
