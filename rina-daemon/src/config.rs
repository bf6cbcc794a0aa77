//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use serde::Deserialize;

/// Daemon-level configuration, loaded from a TOML file and handed to the
/// RIB at startup.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ipcp_name: String,
    pub ipcp_instance: String,
    pub dif_name: String,
    pub lower_difs: Vec<String>,
    pub ctl_socket_path: String,
    pub mgmt_fd_path: String,
    pub logging: Logging,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub env_filter_var: String,
    pub default_directive: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            ipcp_name: "ipcp".to_owned(),
            ipcp_instance: "1".to_owned(),
            dif_name: "default.DIF".to_owned(),
            lower_difs: Vec::new(),
            ctl_socket_path: "/run/rina-rib.sock".to_owned(),
            mgmt_fd_path: "/dev/rina-mgmt".to_owned(),
            logging: Logging::default(),
        }
    }
}

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            env_filter_var: "RINA_LOG".to_owned(),
            default_directive: "rina=debug".to_owned(),
        }
    }
}

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/rina-rib.toml";

    pub(crate) fn load(config_file: Option<&str>) -> Config {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => {
                toml::from_str(&config_str).expect("failed to parse configuration file")
            }
            Err(err) => {
                eprintln!("failed to load configuration file: {err}");
                eprintln!("falling back to default configuration...");
                Config::default()
            }
        }
    }
}
