//! Core types and trait definitions for Quire.
//!
//! Holds the domain model (subjects, groups, posts, comments, books), the
//! group → permission table, and the authorization gate that every mutation
//! passes through. This crate has no HTTP or database
//! dependencies; the store and API crates build on it.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// trait methods instead.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod gate;
pub mod page;
pub mod permission;
pub mod resource;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
