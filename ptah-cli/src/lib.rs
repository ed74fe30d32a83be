//! # ptah-cli
//!
//! Command-line interface for ptah: generate DDL from annotated sources,
//! compare against a live database, write and run migrations, and bootstrap
//! Postgres roles and extensions.
//!
//! The binary is a thin wrapper; every command lives in [`commands`] so it
//! can be driven from tests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
