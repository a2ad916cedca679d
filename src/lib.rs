//! ledger-sync - offline-first ledger with background sync
//!
//! This crate provides the core functionality for the `ledger-sync` CLI:
//! transactions, a profile and monthly forecasts are written to a local
//! SQLite store first and pushed to a remote system of record when the
//! device is online and an owner is known.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Transaction, Profile, Forecast)
//! - [`storage`] - SQLite local record store
//! - [`sync`] - Sync coordinator, service and ports
//! - [`remote`] - REST gateway and session resolution
//! - [`network`] - Connectivity snapshot and probe
//! - [`config`] - Configuration management
//! - [`validate`] - Input validation for local writes
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod network;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
