//! ZCL command definitions

/// ZCL global (profile-wide) commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GlobalCommand {
    /// Read attributes request
    ReadAttributes = 0x00,
    /// Read attributes response
    ReadAttributesResponse = 0x01,
    /// Write attributes request (acknowledged)
    WriteAttributes = 0x02,
    /// Write attributes response
    WriteAttributesResponse = 0x04,
    /// Write attributes without response
    WriteAttributesNoResponse = 0x05,
    /// Configure reporting request
    ConfigureReporting = 0x06,
    /// Configure reporting response
    ConfigureReportingResponse = 0x07,
    /// Unsolicited attribute report
    ReportAttributes = 0x0A,
    /// Default response
    DefaultResponse = 0x0B,
}

impl GlobalCommand {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(GlobalCommand::ReadAttributes),
            0x01 => Some(GlobalCommand::ReadAttributesResponse),
            0x02 => Some(GlobalCommand::WriteAttributes),
            0x04 => Some(GlobalCommand::WriteAttributesResponse),
            0x05 => Some(GlobalCommand::WriteAttributesNoResponse),
            0x06 => Some(GlobalCommand::ConfigureReporting),
            0x07 => Some(GlobalCommand::ConfigureReportingResponse),
            0x0A => Some(GlobalCommand::ReportAttributes),
            0x0B => Some(GlobalCommand::DefaultResponse),
            _ => None,
        }
    }
}

/// On/Off cluster commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OnOffCommand {
    Off = 0x00,
    On = 0x01,
    Toggle = 0x02,
}

impl OnOffCommand {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(OnOffCommand::Off),
            0x01 => Some(OnOffCommand::On),
            0x02 => Some(OnOffCommand::Toggle),
            _ => None,
        }
    }
}

/// IAS Zone cluster commands (server to client)
pub mod ias_zone {
    /// Zone status change notification
    pub const STATUS_CHANGE_NOTIFICATION: u8 = 0x00;
}
