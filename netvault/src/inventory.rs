//! Device inventory.
//!
//! The inventory is a CSV file with one device per row and header-named
//! columns:
//!
//! ```text
//! ip,username,password,device_type,port,secret,hostname
//! 10.0.0.1,admin,admin,cisco_ios,22,enable,r1
//! ```
//!
//! Rows are decoded into [`Device`] records and validated here, so the rest
//! of the crate only ever sees well-formed devices.

use std::fmt;
use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use log::info;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::InventoryError;

/// A fleet member, keyed by hostname.
pub struct Device {
    /// Identity key; also names the device's backup directory.
    pub hostname: String,

    /// Management address (hostname or IP).
    pub address: String,

    /// SSH port.
    pub port: u16,

    /// Login user.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// Enable secret for privileged EXEC.
    pub secret: SecretString,

    /// Device type as written in the inventory (e.g. `cisco_ios`).
    pub device_type: String,
}

impl Device {
    /// Create a device with default port and empty credentials.
    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            port: 22,
            username: String::new(),
            password: SecretString::from(String::new()),
            secret: SecretString::from(String::new()),
            device_type: "cisco_ios".to_string(),
        }
    }

    /// Set the login credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = SecretString::from(password.into());
        self
    }

    /// Set the enable secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = SecretString::from(secret.into());
        self
    }

    /// Set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("hostname", &self.hostname)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("device_type", &self.device_type)
            .finish_non_exhaustive()
    }
}

/// Raw inventory row as it appears in the file.
#[derive(Debug, Deserialize)]
struct InventoryRow {
    #[serde(alias = "address")]
    ip: String,
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    device_type: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    secret: String,
    hostname: String,
}

/// Load and validate every device in the inventory file at `path`.
pub fn load_devices(path: impl AsRef<Path>) -> Result<Vec<Device>, InventoryError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| InventoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let devices = read_devices(file)?;
    info!("Loaded {} devices from {}", devices.len(), path.display());
    Ok(devices)
}

/// Decode and validate devices from any CSV reader.
pub fn read_devices(reader: impl Read) -> Result<Vec<Device>, InventoryError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let mut devices: IndexMap<String, Device> = IndexMap::new();

    for record in csv.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: InventoryRow = record.deserialize(Some(&headers))?;

        let device = validate(row, line)?;
        if devices.contains_key(&device.hostname) {
            return Err(InventoryError::DuplicateHostname {
                hostname: device.hostname,
            });
        }
        devices.insert(device.hostname.clone(), device);
    }

    Ok(devices.into_values().collect())
}

/// Credentials are kept exactly as written; every other field is trimmed.
fn validate(row: InventoryRow, line: u64) -> Result<Device, InventoryError> {
    let invalid = |message: &str| InventoryError::InvalidDevice {
        line,
        message: message.to_string(),
    };

    let hostname = row.hostname.trim();
    let address = row.ip.trim();
    let device_type = row.device_type.trim();
    let port = match row.port.trim() {
        "" => 22,
        port => port
            .parse::<u16>()
            .map_err(|_| invalid(&format!("invalid port '{port}'")))?,
    };

    if hostname.is_empty() {
        return Err(invalid("hostname is empty"));
    }
    if hostname == "." || hostname == ".." || hostname.contains(['/', '\\']) {
        return Err(invalid("hostname cannot be used as a directory name"));
    }
    if address.is_empty() {
        return Err(invalid("address is empty"));
    }

    Ok(Device {
        hostname: hostname.to_string(),
        address: address.to_string(),
        port,
        username: row.username.trim().to_string(),
        password: SecretString::from(row.password),
        secret: SecretString::from(row.secret),
        device_type: if device_type.is_empty() {
            "cisco_ios".to_string()
        } else {
            device_type.to_string()
        },
    })
}
