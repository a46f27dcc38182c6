//! Storefront catalog backend: cached product reads, tagged invalidation and
//! mutation actions, served over axum.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
