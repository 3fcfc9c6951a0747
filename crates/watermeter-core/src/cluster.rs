//! ZCL (Zigbee Cluster Library) definitions used by the water meter

/// ZCL cluster IDs
pub mod id {
    // General Clusters
    pub const BASIC: u16 = 0x0000;
    pub const POWER_CONFIG: u16 = 0x0001;
    pub const IDENTIFY: u16 = 0x0003;
    pub const ON_OFF: u16 = 0x0006;
    pub const ON_OFF_SWITCH_CONFIG: u16 = 0x0007;
    pub const OTA: u16 = 0x0019;
    pub const POLL_CONTROL: u16 = 0x0020;

    // Security Clusters
    pub const IAS_ZONE: u16 = 0x0500;

    // Smart Energy
    pub const METERING: u16 = 0x0702;
}

/// Power configuration cluster attributes
pub mod power_config_attrs {
    /// Battery voltage in 100 mV units
    pub const BATTERY_VOLTAGE: u16 = 0x0020;
    /// Battery percentage in 0.5 % units
    pub const BATTERY_PERCENTAGE_REMAINING: u16 = 0x0021;
}

/// Metering cluster attributes
pub mod metering_attrs {
    /// 48-bit pulse accumulator
    pub const CURRENT_SUMMATION_DELIVERED: u16 = 0x0000;

    // Manufacturer extension range
    pub const HOT_WATER_PRESET: u16 = 0xF000;
    pub const COLD_WATER_PRESET: u16 = 0xF001;
    pub const STEP_WATER_PRESET: u16 = 0xF002;
}

/// IAS Zone cluster attributes
pub mod ias_zone_attrs {
    pub const ZONE_STATUS: u16 = 0x0002;
}

/// IAS zone status bits
pub mod zone_status {
    pub const ALARM1: u16 = 0x0001;
    pub const TAMPER: u16 = 0x0004;
    pub const BATTERY_LOW: u16 = 0x0008;
}

/// Name of a cluster as used by Zigbee2MQTT-style integrations
#[must_use]
pub fn cluster_name(cluster: u16) -> &'static str {
    match cluster {
        id::BASIC => "genBasic",
        id::POWER_CONFIG => "genPowerCfg",
        id::IDENTIFY => "genIdentify",
        id::ON_OFF => "genOnOff",
        id::ON_OFF_SWITCH_CONFIG => "genOnOffSwitchCfg",
        id::OTA => "genOta",
        id::POLL_CONTROL => "genPollCtrl",
        id::IAS_ZONE => "ssIasZone",
        id::METERING => "seMetering",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_names() {
        assert_eq!(cluster_name(0x0702), "seMetering");
        assert_eq!(cluster_name(id::POWER_CONFIG), "genPowerCfg");
        assert_eq!(cluster_name(0xFC00), "unknown");
    }
}
