//! Network side of overcast.
//!
//! This crate provides URL canonicalization, the `Fetcher` seam with its
//! reqwest-backed implementation, and the versioned asset manifest loader.

pub mod fetch;
pub mod manifest;

pub use fetch::{FetchConfig, FetchResponse, Fetcher, NetClient, canonicalize};
