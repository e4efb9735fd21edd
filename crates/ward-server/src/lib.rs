// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator entry point for the Ward permission engine.

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Args, Command};
pub use commands::{connect, execute, run};
pub use logging::init_tracing;
