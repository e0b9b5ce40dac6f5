// SPDX-License-Identifier: GPL-3.0-only

//! Daemon configuration
//!
//! Values come from three layers: command-line arguments, an optional TOML
//! file named by `--config`, and built-in defaults. Earlier layers win.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use zfsd_sys::repository::DEFAULT_ZFS_BINARY;
use zfsd_sys::{Decoding, OutputShape};

pub const DEFAULT_ADDRESS: &str = "/tmp/zfsd.sock";
pub const DEFAULT_SOCKET_MODE: u32 = 0o700;
pub const DEFAULT_LOG_FILTER: &str = "zfsd_service=info,zfsd_sys=info,warn";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid socket mode {0:#o}, expected at most 0o777")]
    SocketMode(u32),
}

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "zfsd")]
#[command(version, about = "JSON-RPC control daemon for zfs datasets", long_about = None)]
pub struct Args {
    /// Listen address; a value containing '/' is a unix socket path, anything else a TCP address
    #[arg(long)]
    pub address: Option<String>,

    /// Permissions applied to the unix socket file, in octal
    #[arg(long, value_parser = parse_mode)]
    pub socket_mode: Option<u32>,

    /// zfs program, resolved through PATH when not absolute
    #[arg(long)]
    pub zfs_binary: Option<String>,

    /// Output layout requested from zfs: property-rows or columns
    #[arg(long)]
    pub output_shape: Option<OutputShape>,

    /// Reject malformed property values instead of decoding them as zero
    #[arg(long)]
    pub strict: bool,

    /// Log filter directives, e.g. "zfsd_sys=debug"
    #[arg(long)]
    pub log_filter: Option<String>,

    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode '{value}': {e}"))
}

/// Contents of the `--config` file
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub address: Option<String>,
    pub socket_mode: Option<u32>,
    pub zfs_binary: Option<String>,
    pub output_shape: Option<OutputShape>,
    pub strict: Option<bool>,
    pub log_filter: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    Unix(PathBuf),
    Tcp(String),
}

impl ListenAddress {
    pub fn parse(address: &str) -> Self {
        if address.contains('/') {
            Self::Unix(PathBuf::from(address))
        } else {
            Self::Tcp(address.to_string())
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen: ListenAddress,
    pub socket_mode: u32,
    pub zfs_binary: String,
    pub output_shape: OutputShape,
    pub decoding: Decoding,
    pub log_filter: Option<String>,
}

impl Config {
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    pub fn resolve(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let socket_mode = args
            .socket_mode
            .or(file.socket_mode)
            .unwrap_or(DEFAULT_SOCKET_MODE);
        if socket_mode > 0o777 {
            return Err(ConfigError::SocketMode(socket_mode));
        }

        let strict = args.strict || file.strict.unwrap_or(false);
        let address = args
            .address
            .or(file.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        Ok(Self {
            listen: ListenAddress::parse(&address),
            socket_mode,
            zfs_binary: args
                .zfs_binary
                .or(file.zfs_binary)
                .unwrap_or_else(|| DEFAULT_ZFS_BINARY.to_string()),
            output_shape: args.output_shape.or(file.output_shape).unwrap_or_default(),
            decoding: if strict {
                Decoding::Strict
            } else {
                Decoding::Lenient
            },
            log_filter: args.log_filter.or(file.log_filter),
        })
    }
}
