//! HTTP route handlers, one module per area of the storefront.

pub mod account;
pub mod admin;
pub mod auth;
pub mod bans;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod comments;
pub mod contact;
pub mod pages;
