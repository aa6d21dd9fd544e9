//! Property-based tests

mod engine_proptest;
#[cfg(feature = "ssr")]
mod topology_proptest;
