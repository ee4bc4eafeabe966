//! AlibabaCloudStack RPC API client

pub mod client;
pub mod common;
pub mod error;
pub mod poll;
pub mod retry;
pub mod signer;

pub mod arms;
pub mod cloudfw;
pub mod cms;
pub mod ecs;
pub mod gdb;
pub mod nas;
pub mod quickbi;
pub mod vpc;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, ClientConfig, Product};
pub use common::RpcParams;
pub use error::{ApiError, Result};
pub use poll::{Refresh, StateConf};
pub use retry::Retry;
