//! Application services coordinating the store, the reducer and the cache.

pub mod error;
pub mod pagination;
pub mod questions;
pub mod repos;
