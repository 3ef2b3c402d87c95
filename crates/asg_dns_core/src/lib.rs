//! Shared domain primitives for Auto Scaling group DNS reconciliation.
//!
//! This crate owns the tag grammar, lifecycle event decoding, zone prefix
//! completion and record mutation shapes. It intentionally excludes AWS SDK
//! and Lambda runtime concerns; see `asg_dns_lambda` for those.

pub mod event;
pub mod mutation;
pub mod tag_spec;
pub mod zone;
