//! Devices bound to a profile

use crate::error::ConverterError;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A physical device and the model identifier selecting its profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundDevice {
    /// IEEE address (EUI-64)
    pub ieee_address: [u8; 8],
    /// Model identifier (from Basic cluster)
    pub model_id: String,
    /// User-assigned friendly name
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Last time the device sent telemetry
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl BoundDevice {
    #[must_use]
    pub fn new(ieee_address: [u8; 8], model_id: &str) -> Self {
        Self {
            ieee_address,
            model_id: model_id.to_string(),
            friendly_name: None,
            last_seen: None,
        }
    }

    /// Get IEEE address as hex string
    #[must_use]
    pub fn ieee_address_string(&self) -> String {
        format_ieee_address(&self.ieee_address)
    }

    /// Get a display name (friendly name or IEEE address)
    #[must_use]
    pub fn display_name(&self) -> String {
        self.friendly_name
            .clone()
            .unwrap_or_else(|| self.ieee_address_string())
    }
}

/// Format an IEEE address most significant byte first, `00:12:4b:...`
#[must_use]
pub fn format_ieee_address(ieee_address: &[u8; 8]) -> String {
    ieee_address
        .iter()
        .rev() // stored little-endian, displayed in reverse byte order
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse an IEEE address, with or without `:` separators or a `0x` prefix
#[allow(clippy::missing_errors_doc)]
pub fn parse_ieee_address(text: &str) -> Result<[u8; 8], ConverterError> {
    let invalid = || ConverterError::InvalidAddress(text.to_string());
    let text = text.trim();
    let hex: String = text
        .strip_prefix("0x")
        .unwrap_or(text)
        .chars()
        .filter(|c| *c != ':')
        .collect();
    // from_str_radix alone would accept a leading sign
    if hex.len() != 16 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let value = u64::from_str_radix(&hex, 16).map_err(|_| invalid())?;
    Ok(value.to_le_bytes())
}
