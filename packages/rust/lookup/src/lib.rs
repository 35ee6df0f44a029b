//! Remote lookup aggregation for marketfeed.
//!
//! This crate provides [`ItemLookup`], which turns one item identifier into
//! a fully merged [`ItemRecord`](marketfeed_shared::ItemRecord) by querying
//! four remote endpoints: the primary item lookup first, then the seller,
//! category, and currency lookups concurrently.

pub mod client;

pub use client::ItemLookup;
