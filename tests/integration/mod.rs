//! Integration tests
//!
//! `realtime_test` and `sync_client_test` run against a real server;
//! `api_client_test` drives the REST client against wiremock.

mod api_client_test;
#[cfg(feature = "ssr")]
mod realtime_test;
#[cfg(feature = "ssr")]
mod sync_client_test;
