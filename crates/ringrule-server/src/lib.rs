//! # ringrule-server
//!
//! HTTP server library for the ringrule ringer mode engine.
//!
//! This library provides the API handlers, state management and logging
//! setup. The `ringrule-server` binary wires them to a TCP listener.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
