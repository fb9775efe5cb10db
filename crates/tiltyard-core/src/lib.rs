//! Core types and trait definitions for the Tiltyard authorization roster.
//!
//! Tiltyard tracks combatants, their per-discipline authorization cards,
//! their waivers, and the expiry reminders derived from both. This crate is
//! deliberately free of HTTP and database dependencies. All other crates
//! depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod card;
pub mod combatant;
pub mod crypto;
pub mod discipline;
pub mod error;
pub mod notify;
pub mod principal;
pub mod privacy;
pub mod renewal;
pub mod store;
pub mod update_request;

pub use error::{Error, Result};
