//! Core dispatch engine.
//!
//! Everything between "a message arrived" and "a reply was produced" lives here:
//! descriptors and the registry, the two invocation adapters, resolution, argument
//! binding, access, piping, deployment export, and reply delivery.

pub mod access;
pub mod config;
pub mod deploy;
pub mod descriptor;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod handler;
pub mod invocation;
pub mod listing;
pub mod option;
pub mod pipeline;
pub mod registry;
pub mod reply;
pub mod resolve;
pub mod value;
