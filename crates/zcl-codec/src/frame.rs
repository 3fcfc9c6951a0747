//! ZCL frame header handling

use crate::commands::GlobalCommand;
use crate::types::ProtocolError;

/// Minimum frame size: `frame_control(1)` + seq(1) + cmd(1) = 3
pub const MIN_FRAME_SIZE: usize = 3;

/// Frame control bits
pub mod frame_control {
    /// Frame type: cluster specific (global when clear)
    pub const CLUSTER_SPECIFIC: u8 = 0x01;
    /// Manufacturer code present
    pub const MANUFACTURER_SPECIFIC: u8 = 0x04;
    /// Direction: server to client
    pub const SERVER_TO_CLIENT: u8 = 0x08;
    /// Disable default response
    pub const DISABLE_DEFAULT_RESPONSE: u8 = 0x10;
}

/// ZCL frame (Zigbee Cluster Library)
///
/// Frame format:
/// ```text
/// [Frame Control: 1 byte]
/// [Manufacturer Code: 2 bytes LE] (only if manufacturer-specific bit set)
/// [Transaction Sequence: 1 byte]
/// [Command ID: 1 byte]
/// [Payload: variable]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZclFrame {
    frame_control: u8,
    manufacturer_code: Option<u16>,
    transaction_seq: u8,
    command_id: u8,
    payload: Vec<u8>,
}

impl ZclFrame {
    /// Create a global command frame (client to server)
    #[must_use]
    pub fn global(transaction_seq: u8, command: GlobalCommand, payload: Vec<u8>) -> Self {
        Self {
            frame_control: 0x00,
            manufacturer_code: None,
            transaction_seq,
            command_id: command as u8,
            payload,
        }
    }

    /// Create a cluster-specific command frame (client to server)
    #[must_use]
    pub fn cluster_command(transaction_seq: u8, command_id: u8, payload: Vec<u8>) -> Self {
        Self {
            frame_control: frame_control::CLUSTER_SPECIFIC,
            manufacturer_code: None,
            transaction_seq,
            command_id,
            payload,
        }
    }

    /// Mark the frame as manufacturer specific
    #[must_use]
    pub fn with_manufacturer_code(mut self, code: u16) -> Self {
        self.frame_control |= frame_control::MANUFACTURER_SPECIFIC;
        self.manufacturer_code = Some(code);
        self
    }

    /// Flip the direction to server to client
    #[must_use]
    pub fn from_server(mut self) -> Self {
        self.frame_control |= frame_control::SERVER_TO_CLIENT;
        self
    }

    /// Parse a ZCL frame from raw ASDU bytes
    #[allow(clippy::missing_errors_doc)]
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(ProtocolError::FrameTooShort(data.len()));
        }

        let frame_control = data[0];
        let mut idx = 1;

        let manufacturer_code = if (frame_control & frame_control::MANUFACTURER_SPECIFIC) != 0 {
            if data.len() < idx + 2 + 2 {
                return Err(ProtocolError::FrameTooShort(data.len()));
            }
            let code = u16::from_le_bytes([data[idx], data[idx + 1]]);
            idx += 2;
            Some(code)
        } else {
            None
        };

        let transaction_seq = data[idx];
        idx += 1;
        let command_id = data[idx];
        idx += 1;

        let payload = data[idx..].to_vec();

        Ok(Self {
            frame_control,
            manufacturer_code,
            transaction_seq,
            command_id,
            payload,
        })
    }

    /// Get frame control byte
    #[must_use]
    pub fn frame_control(&self) -> u8 {
        self.frame_control
    }

    /// Manufacturer code, if manufacturer specific
    #[must_use]
    pub fn manufacturer_code(&self) -> Option<u16> {
        self.manufacturer_code
    }

    /// Check if this is a cluster-specific command (vs global)
    #[must_use]
    pub fn is_cluster_specific(&self) -> bool {
        (self.frame_control & 0x03) == frame_control::CLUSTER_SPECIFIC
    }

    /// Check if this is from server to client (vs client to server)
    #[must_use]
    pub fn is_from_server(&self) -> bool {
        (self.frame_control & frame_control::SERVER_TO_CLIENT) != 0
    }

    #[must_use]
    pub fn transaction_seq(&self) -> u8 {
        self.transaction_seq
    }

    /// Get the command ID
    #[must_use]
    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    /// Global command, if this is a global frame with a known command
    #[must_use]
    pub fn global_command(&self) -> Option<GlobalCommand> {
        if self.is_cluster_specific() {
            None
        } else {
            GlobalCommand::from_u8(self.command_id)
        }
    }

    /// Get the payload
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to bytes
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(5 + self.payload.len());
        data.push(self.frame_control);
        if let Some(mfr) = self.manufacturer_code {
            data.extend_from_slice(&mfr.to_le_bytes());
        }
        data.push(self.transaction_seq);
        data.push(self.command_id);
        data.extend_from_slice(&self.payload);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_short() {
        let result = ZclFrame::parse(&[0x08, 0x01]);
        assert!(matches!(result, Err(ProtocolError::FrameTooShort(2))));
    }

    #[test]
    fn test_parse_report_header() {
        // Server-to-client global report attributes, seq 0x42
        let frame = ZclFrame::parse(&[0x18, 0x42, 0x0A, 0x00, 0x00]).unwrap();
        assert!(frame.is_from_server());
        assert!(!frame.is_cluster_specific());
        assert_eq!(frame.transaction_seq(), 0x42);
        assert_eq!(frame.global_command(), Some(GlobalCommand::ReportAttributes));
        assert_eq!(frame.payload(), &[0x00, 0x00]);
    }

    #[test]
    fn test_manufacturer_specific_header() {
        let frame = ZclFrame::global(7, GlobalCommand::WriteAttributes, vec![0xAA])
            .with_manufacturer_code(0x1037);
        let bytes = frame.serialize();
        assert_eq!(bytes, vec![0x04, 0x37, 0x10, 0x07, 0x02, 0xAA]);

        let parsed = ZclFrame::parse(&bytes).unwrap();
        assert_eq!(parsed.manufacturer_code(), Some(0x1037));
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_manufacturer_specific_truncated() {
        let result = ZclFrame::parse(&[0x04, 0x37, 0x10]);
        assert!(matches!(result, Err(ProtocolError::FrameTooShort(3))));
    }

    #[test]
    fn test_cluster_command_has_no_global() {
        let frame = ZclFrame::cluster_command(1, 0x01, Vec::new());
        assert!(frame.is_cluster_specific());
        assert_eq!(frame.global_command(), None);
        assert_eq!(frame.command_id(), 0x01);
    }
}
