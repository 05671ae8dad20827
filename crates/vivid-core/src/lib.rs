//! Core library for the Vivid Vision storefront.
//!
//! Contains the typed document store, users and access policy, the product
//! catalog, comments with auto-moderation, bans and appeals, cart and
//! checkout, orders, announcements, server-side sessions, and the business
//! event log. This crate depends on `vivid-storage` for the storage backend
//! trait and knows nothing about HTTP.

pub mod access;
pub mod announcement;
pub mod ban;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod comment;
pub mod error;
pub mod events;
pub mod events_file;
pub mod moderation;
pub mod order;
pub mod session;
pub mod stats;
pub mod store;
pub mod user;
