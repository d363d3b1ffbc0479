//! headerbridge-evm — an HTTP JSON-RPC [`ChainClient`](headerbridge_core::ChainClient)
//! for EVM root chains.

pub mod client;
mod rpc;

pub use client::{header_from_json, parse_hex_u64, HttpChainClient, HttpClientConfig};
