//! # unictl-domain
//!
//! Pure domain model for the unictl script-and-template automation core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Entities** (a script paired with an HTML/CSS template and a schedule)
//! - Define **Execution outcomes** (completed, failed, disabled after repeated failures)
//! - Define **External state** (snapshots of the hosting environment's entities)
//! - Define **Action requests** (side effects scripts ask the host to perform)
//! - Define **Events** (records pushed to observers after every mutation)
//! - Provide the **Template engine** (`{{ path }}`, `{% if %}`, `{% for %}`, `{{ fn() }}`)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod entity;
pub mod event;
pub mod execution;
pub mod state;
pub mod template;
