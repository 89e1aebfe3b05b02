// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration of the operator.
//!
//! Every flag can also be set through its environment variable, which is how
//! the operator is usually configured inside a Deployment.
//!
//! ```bash
//! lms-moodle-operator --requeue-not-ready-secs 5 --log-format json
//! LMS_METRICS_ADDR=0.0.0.0:9090 lms-moodle-operator
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::constants::{
    DEFAULT_METRICS_ADDR, ERROR_REQUEUE_DURATION_SECS, OPERATOR_NAME, REQUEUE_NOT_READY_SECS,
    REQUEUE_READY_SECS,
};

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// LMS Moodle operator
#[derive(Debug, Parser)]
#[command(name = "lms-moodle-operator", version, about, long_about = None)]
pub struct Cli {
    /// Bind address of the health and metrics server
    #[arg(long, env = "LMS_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Requeue interval of a settled site, in seconds
    #[arg(long, env = "LMS_REQUEUE_READY_SECS", default_value_t = REQUEUE_READY_SECS)]
    pub requeue_ready_secs: u64,

    /// Requeue interval while dependants are converging, in seconds
    #[arg(long, env = "LMS_REQUEUE_NOT_READY_SECS", default_value_t = REQUEUE_NOT_READY_SECS)]
    pub requeue_not_ready_secs: u64,

    /// Requeue interval after a failed reconcile, in seconds
    #[arg(long, env = "LMS_ERROR_REQUEUE_SECS", default_value_t = ERROR_REQUEUE_DURATION_SECS)]
    pub error_requeue_secs: u64,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, ignore_case = true, default_value_t)]
    pub log_format: LogFormat,

    /// Field manager used for server-side apply
    #[arg(long, env = "LMS_FIELD_MANAGER", default_value = OPERATOR_NAME)]
    pub field_manager: String,
}

/// Runtime settings shared by every controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub metrics_addr: SocketAddr,
    pub requeue_ready: Duration,
    pub requeue_not_ready: Duration,
    pub error_requeue: Duration,
    pub log_format: LogFormat,
    pub field_manager: String,
}

impl From<Cli> for OperatorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            metrics_addr: cli.metrics_addr,
            requeue_ready: Duration::from_secs(cli.requeue_ready_secs),
            requeue_not_ready: Duration::from_secs(cli.requeue_not_ready_secs),
            error_requeue: Duration::from_secs(cli.error_requeue_secs),
            log_format: cli.log_format,
            field_manager: cli.field_manager,
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            requeue_ready: Duration::from_secs(REQUEUE_READY_SECS),
            requeue_not_ready: Duration::from_secs(REQUEUE_NOT_READY_SECS),
            error_requeue: Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
            log_format: LogFormat::Text,
            field_manager: OPERATOR_NAME.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
