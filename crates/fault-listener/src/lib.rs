//! Cluster fault listener and orphan-sweep coordinator.
//!
//! A `FaultListener` registers its node as live, watches cluster membership and,
//! whenever a node departs, asks every configured recovery subsystem to take over the
//! work that node owned. At startup it also runs a catch-up sweep for every node that
//! is not live, covering failures that happened while no listener was running.
//!
//! The listener never performs recovery itself. It relies on each subsystem's sweep
//! being idempotent per node, which lets duplicate `NodeRemoved` deliveries and the
//! overlap between the catch-up sweep and live events go unguarded.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod consumer;
mod error;
mod lifecycle;
mod listener;
mod sweep;

pub use config::FaultListenerConfig;
pub use error::{Error, Result};
pub use listener::FaultListener;
