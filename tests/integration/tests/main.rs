//! End-to-End Integration Tests
//!
//! Scenario tests driving the complete engine against the in-memory
//! directory: nested membership, member expansion, classification,
//! referral chasing and range-limited attributes.

mod common;
mod expansion;
mod finder;
mod membership;
mod range;
mod referrals;
