//! Application services: cached reads, mutation actions, and the seams they
//! depend on.

pub mod catalog;
pub mod error;
pub mod products;
pub mod report;
pub mod repos;
pub mod social;
