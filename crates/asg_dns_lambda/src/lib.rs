//! AWS-oriented adapters and handlers for lifecycle-driven DNS reconciliation.
//!
//! This crate owns runtime integration details (the Lambda handler, collaborator
//! traits for the tag store, instance inventory and zone service, configuration
//! and telemetry). Tag grammar and record shapes live in `asg_dns_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod telemetry;
