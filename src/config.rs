//! Configuration files for the command line tool.
//!
//! A profile is a YAML (or JSON) mapping with the same camelCase keys as the
//! long flags. Every key is optional; values present on the command line or
//! in `SELF_CERT_*` environment variables win over the file.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Profile consulted by `ca` commands.
pub const CA_CONFIG: &str = "ca_config";
/// Profile consulted by `server` commands.
pub const SERVER_CONFIG: &str = "server_config";

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub serial_number: Option<u64>,
    pub bits: Option<usize>,
    pub days: Option<u32>,
    pub country: Option<Vec<String>>,
    pub organization: Option<Vec<String>>,
    pub organization_unit: Option<Vec<String>>,
    pub common_name: Option<String>,
    pub dns_names: Option<Vec<String>>,
    pub ip_addresses: Option<Vec<IpAddr>>,
    pub email_addresses: Option<Vec<String>>,
    pub urls: Option<Vec<Url>>,
    pub ca_cert: Option<PathBuf>,
    pub ca_key: Option<PathBuf>,
    pub csr: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Loads `explicit` when given, otherwise the first profile called `name`
    /// found in the search directories. No profile at all yields the empty
    /// configuration.
    pub fn load(explicit: Option<&Path>, name: &str) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match find(name, &search_dirs()) {
                Some(path) => path,
                None => {
                    tracing::debug!(name, "no config file found");
                    return Ok(Self::default());
                }
            },
        };
        tracing::debug!(path = %path.display(), "loading config file");
        Self::from_path(&path)
    }
}

/// `/etc/self_certificate`, the working directory, then
/// `$HOME/self_certificate`.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/etc/self_certificate"), PathBuf::from(".")];
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(Path::new(&home).join("self_certificate"));
    }
    dirs
}

pub fn find(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| EXTENSIONS.iter().map(move |ext| dir.join(format!("{name}.{ext}"))))
        .find(|candidate| candidate.is_file())
}
