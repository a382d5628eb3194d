//! Mailroom — keyword-driven message triage.

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rules;
pub mod store;
