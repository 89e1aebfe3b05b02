// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::*;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_defaults_match_operator_config_default() {
        let cli = Cli::try_parse_from(["lms-moodle-operator"]).unwrap();

        assert_eq!(OperatorConfig::from(cli), OperatorConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "lms-moodle-operator",
            "--metrics-addr",
            "127.0.0.1:9090",
            "--requeue-not-ready-secs",
            "5",
            "--log-format",
            "json",
            "--field-manager",
            "lms-test",
        ])
        .unwrap();
        let config = OperatorConfig::from(cli);

        assert_eq!(config.metrics_addr.port(), 9090);
        assert_eq!(config.requeue_not_ready, Duration::from_secs(5));
        assert_eq!(config.requeue_ready, Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.field_manager, "lms-test");
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        assert!(Cli::try_parse_from(["lms-moodle-operator", "--log-format", "xml"]).is_err());
    }
}
