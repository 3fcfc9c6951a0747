//! Built-in profiles for the TLSR8258 water meter family
//!
//! Each profile is a complete table on its own; nothing is inherited
//! between them.

use crate::cluster::{id, metering_attrs, power_config_attrs};
use crate::decoder::DecoderRule;
use crate::encoder::{EncoderRule, ReadRule, Target};
use crate::error::ProfileError;
use crate::profile::{Access, DeviceProfile, ExposedField, OtaCapability};
use crate::transport::{BindRequest, ReadRequest, ReportingConfig};
use zcl_codec::{DataType, ReportingRecord};

const VENDOR: &str = "Slacky-DIY";

/// Endpoint carrying the preset attributes
const CONTROL_ENDPOINT: u8 = 3;

fn reporting(
    endpoint: u8,
    cluster: u16,
    attribute: u16,
    data_type: DataType,
    min_interval: u16,
    max_interval: u16,
) -> ReportingConfig {
    ReportingConfig {
        endpoint,
        cluster,
        record: ReportingRecord {
            attribute,
            data_type,
            min_interval,
            max_interval,
            reportable_change: 0,
        },
    }
}

/// Two-channel meter: hot water on endpoint 1, cold water on endpoint 2
#[allow(clippy::missing_errors_doc)]
pub fn basic_profile() -> Result<DeviceProfile, ProfileError> {
    DeviceProfile::builder("Watermeter TLSR8258")
        .zigbee_model("Watermeter_TLSR8258")
        .vendor(VENDOR)
        .description("Water Meter")
        .multi_endpoint()
        .decoder(DecoderRule::battery())
        .decoder(DecoderRule::metering_volume(&[]))
        .encoder(EncoderRule::new(
            "currentsummdelivered",
            Target::Qualified,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
        ))
        .getter(ReadRule::new(
            "volume",
            Target::Qualified,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .expose(
            ExposedField::numeric("battery", Access::ReadOnly)
                .with_unit("%")
                .with_description("Remaining battery in %"),
        )
        .expose(
            ExposedField::numeric("voltage", Access::ReadOnly)
                .with_unit("mV")
                .with_description("Voltage of the battery in millivolts"),
        )
        .expose(
            ExposedField::numeric("volume", Access::ReadOnly)
                .with_unit("Liters")
                .with_description("Hot water")
                .with_endpoint(1),
        )
        .expose(
            ExposedField::numeric("volume", Access::ReadOnly)
                .with_unit("Liters")
                .with_description("Cold water")
                .with_endpoint(2),
        )
        .expose(
            ExposedField::numeric("currentsummdelivered", Access::WriteOnly)
                .with_unit("Liters")
                .with_description("Set hot water counter")
                .with_endpoint(1),
        )
        .expose(
            ExposedField::numeric("currentsummdelivered", Access::WriteOnly)
                .with_unit("Liters")
                .with_description("Set cold water counter")
                .with_endpoint(2),
        )
        .read_on_configure(ReadRequest::new(
            1,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .read_on_configure(ReadRequest::new(
            1,
            id::POWER_CONFIG,
            &[
                power_config_attrs::BATTERY_VOLTAGE,
                power_config_attrs::BATTERY_PERCENTAGE_REMAINING,
            ],
        ))
        .read_on_configure(ReadRequest::new(
            2,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .bind(BindRequest::new(1, &[id::POWER_CONFIG, id::METERING]))
        .bind(BindRequest::new(2, &[id::METERING]))
        .reporting(reporting(
            1,
            id::POWER_CONFIG,
            power_config_attrs::BATTERY_VOLTAGE,
            DataType::Uint8,
            300,
            3600,
        ))
        .reporting(reporting(
            1,
            id::POWER_CONFIG,
            power_config_attrs::BATTERY_PERCENTAGE_REMAINING,
            DataType::Uint8,
            300,
            3600,
        ))
        .reporting(reporting(
            1,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
            0,
            3600,
        ))
        .reporting(reporting(
            2,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
            0,
            3600,
        ))
        .build()
}

/// Two-channel meter with hot / cold / step presets on endpoint 3
#[allow(clippy::missing_errors_doc)]
pub fn preset_profile() -> Result<DeviceProfile, ProfileError> {
    DeviceProfile::builder("Watermeter TLSR8258 Preset")
        .zigbee_model("Watermeter_TLSR8258_Preset")
        .vendor(VENDOR)
        .description("Water Meter with presets")
        .multi_endpoint()
        .decoder(DecoderRule::battery())
        .decoder(DecoderRule::metering_volume(&[1, 2]))
        .decoder(
            DecoderRule::attribute(
                id::METERING,
                metering_attrs::HOT_WATER_PRESET,
                "hot_water_preset",
            )
            .on_endpoints(&[CONTROL_ENDPOINT]),
        )
        .decoder(
            DecoderRule::attribute(
                id::METERING,
                metering_attrs::COLD_WATER_PRESET,
                "cold_water_preset",
            )
            .on_endpoints(&[CONTROL_ENDPOINT]),
        )
        .decoder(
            DecoderRule::attribute(
                id::METERING,
                metering_attrs::STEP_WATER_PRESET,
                "step_water_preset",
            )
            .on_endpoints(&[CONTROL_ENDPOINT]),
        )
        .encoder(EncoderRule::new(
            "currentsummdelivered",
            Target::Qualified,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
        ))
        .encoder(EncoderRule::new(
            "hot_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            metering_attrs::HOT_WATER_PRESET,
            DataType::Uint8,
        ))
        .encoder(EncoderRule::new(
            "cold_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            metering_attrs::COLD_WATER_PRESET,
            DataType::Uint8,
        ))
        .encoder(EncoderRule::new(
            "step_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            metering_attrs::STEP_WATER_PRESET,
            DataType::Uint16,
        ))
        .getter(ReadRule::new(
            "volume",
            Target::Qualified,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .getter(ReadRule::new(
            "hot_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            &[metering_attrs::HOT_WATER_PRESET],
        ))
        .getter(ReadRule::new(
            "cold_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            &[metering_attrs::COLD_WATER_PRESET],
        ))
        .getter(ReadRule::new(
            "step_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            &[metering_attrs::STEP_WATER_PRESET],
        ))
        .expose(
            ExposedField::numeric("battery", Access::ReadOnly)
                .with_unit("%")
                .with_description("Remaining battery in %"),
        )
        .expose(
            ExposedField::numeric("voltage", Access::ReadOnly)
                .with_unit("mV")
                .with_description("Voltage of the battery in millivolts"),
        )
        .expose(
            ExposedField::numeric("volume", Access::ReadOnly)
                .with_unit("Liters")
                .with_description("Hot water")
                .with_endpoint(1),
        )
        .expose(
            ExposedField::numeric("volume", Access::ReadOnly)
                .with_unit("Liters")
                .with_description("Cold water")
                .with_endpoint(2),
        )
        .expose(
            ExposedField::numeric("currentsummdelivered", Access::WriteOnly)
                .with_unit("Liters")
                .with_description("Set hot water counter")
                .with_endpoint(1),
        )
        .expose(
            ExposedField::numeric("currentsummdelivered", Access::WriteOnly)
                .with_unit("Liters")
                .with_description("Set cold water counter")
                .with_endpoint(2),
        )
        .expose(
            ExposedField::numeric("hot_water_preset", Access::ReadWrite)
                .with_unit("Liters")
                .with_description("Preset hot water"),
        )
        .expose(
            ExposedField::numeric("cold_water_preset", Access::ReadWrite)
                .with_unit("Liters")
                .with_description("Preset cold water"),
        )
        .expose(
            ExposedField::numeric("step_water_preset", Access::ReadWrite)
                .with_unit("Liters")
                .with_description("Preset step water"),
        )
        .read_on_configure(ReadRequest::new(
            1,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .read_on_configure(ReadRequest::new(
            1,
            id::POWER_CONFIG,
            &[
                power_config_attrs::BATTERY_VOLTAGE,
                power_config_attrs::BATTERY_PERCENTAGE_REMAINING,
            ],
        ))
        .read_on_configure(ReadRequest::new(
            2,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .bind(BindRequest::new(1, &[id::POWER_CONFIG, id::METERING]))
        .bind(BindRequest::new(2, &[id::METERING]))
        .reporting(reporting(
            1,
            id::POWER_CONFIG,
            power_config_attrs::BATTERY_VOLTAGE,
            DataType::Uint8,
            300,
            3600,
        ))
        .reporting(reporting(
            1,
            id::POWER_CONFIG,
            power_config_attrs::BATTERY_PERCENTAGE_REMAINING,
            DataType::Uint8,
            300,
            3600,
        ))
        .reporting(reporting(
            1,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
            0,
            300,
        ))
        .reporting(reporting(
            2,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
            0,
            300,
        ))
        .build()
}

/// Preset meter plus water leak alarm and remote on/off buttons (endpoints 4, 5)
#[allow(clippy::missing_errors_doc, clippy::too_many_lines)]
pub fn leak_profile(ota: Option<OtaCapability>) -> Result<DeviceProfile, ProfileError> {
    let mut builder = DeviceProfile::builder("Watermeter TLSR8258 Leak")
        .zigbee_model("Watermeter_TLSR8258_wleak")
        .vendor(VENDOR)
        .description("Water Meter with leak sensor")
        .multi_endpoint()
        .decoder(DecoderRule::battery())
        .decoder(DecoderRule::ias_water_leak_alarm())
        .decoder(DecoderRule::command_on_off(&[4, 5]))
        .decoder(DecoderRule::metering_volume(&[1, 2]))
        .decoder(
            DecoderRule::attribute(
                id::METERING,
                metering_attrs::HOT_WATER_PRESET,
                "hot_water_preset",
            )
            .on_endpoints(&[CONTROL_ENDPOINT]),
        )
        .decoder(
            DecoderRule::attribute(
                id::METERING,
                metering_attrs::COLD_WATER_PRESET,
                "cold_water_preset",
            )
            .on_endpoints(&[CONTROL_ENDPOINT]),
        )
        .decoder(
            DecoderRule::attribute(
                id::METERING,
                metering_attrs::STEP_WATER_PRESET,
                "step_water_preset",
            )
            .on_endpoints(&[CONTROL_ENDPOINT]),
        )
        .encoder(EncoderRule::new(
            "currentsummdelivered",
            Target::Qualified,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
        ))
        .encoder(EncoderRule::new(
            "hot_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            metering_attrs::HOT_WATER_PRESET,
            DataType::Uint8,
        ))
        .encoder(EncoderRule::new(
            "cold_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            metering_attrs::COLD_WATER_PRESET,
            DataType::Uint8,
        ))
        .encoder(EncoderRule::new(
            "step_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            metering_attrs::STEP_WATER_PRESET,
            DataType::Uint16,
        ))
        .getter(ReadRule::new(
            "volume",
            Target::Qualified,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .getter(ReadRule::new(
            "hot_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            &[metering_attrs::HOT_WATER_PRESET],
        ))
        .getter(ReadRule::new(
            "cold_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            &[metering_attrs::COLD_WATER_PRESET],
        ))
        .getter(ReadRule::new(
            "step_water_preset",
            Target::Fixed(CONTROL_ENDPOINT),
            id::METERING,
            &[metering_attrs::STEP_WATER_PRESET],
        ))
        .expose(
            ExposedField::numeric("battery", Access::ReadOnly)
                .with_unit("%")
                .with_description("Remaining battery in %"),
        )
        .expose(
            ExposedField::numeric("voltage", Access::ReadOnly)
                .with_unit("mV")
                .with_description("Voltage of the battery in millivolts"),
        )
        .expose(
            ExposedField::binary("water_leak", Access::ReadOnly)
                .with_description("Indicates whether the device detected a water leak"),
        )
        .expose(
            ExposedField::binary("tamper", Access::ReadOnly)
                .with_description("Indicates whether the device is tampered"),
        )
        .expose(
            ExposedField::binary("battery_low", Access::ReadOnly)
                .with_description("Indicates if the battery of this device is almost empty"),
        )
        .expose(
            ExposedField::enumeration(
                "action",
                Access::ReadOnly,
                &["on_4", "off_4", "toggle_4", "on_5", "off_5", "toggle_5"],
            )
            .with_description("Triggered action (e.g. a button click)"),
        )
        .expose(
            ExposedField::numeric("volume", Access::ReadOnly)
                .with_unit("Liters")
                .with_description("Hot water")
                .with_endpoint(1),
        )
        .expose(
            ExposedField::numeric("volume", Access::ReadOnly)
                .with_unit("Liters")
                .with_description("Cold water")
                .with_endpoint(2),
        )
        .expose(
            ExposedField::numeric("currentsummdelivered", Access::WriteOnly)
                .with_unit("Liters")
                .with_description("Set hot water counter")
                .with_endpoint(1),
        )
        .expose(
            ExposedField::numeric("currentsummdelivered", Access::WriteOnly)
                .with_unit("Liters")
                .with_description("Set cold water counter")
                .with_endpoint(2),
        )
        .expose(
            ExposedField::numeric("hot_water_preset", Access::ReadWrite)
                .with_unit("Liters")
                .with_description("Preset hot water"),
        )
        .expose(
            ExposedField::numeric("cold_water_preset", Access::ReadWrite)
                .with_unit("Liters")
                .with_description("Preset cold water"),
        )
        .expose(
            ExposedField::numeric("step_water_preset", Access::ReadWrite)
                .with_unit("Liters")
                .with_description("Preset step water"),
        )
        .read_on_configure(ReadRequest::new(
            1,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .read_on_configure(ReadRequest::new(
            1,
            id::POWER_CONFIG,
            &[
                power_config_attrs::BATTERY_VOLTAGE,
                power_config_attrs::BATTERY_PERCENTAGE_REMAINING,
            ],
        ))
        .read_on_configure(ReadRequest::new(
            2,
            id::METERING,
            &[metering_attrs::CURRENT_SUMMATION_DELIVERED],
        ))
        .bind(BindRequest::new(1, &[id::POWER_CONFIG, id::METERING]))
        .bind(BindRequest::new(2, &[id::METERING]))
        .bind(BindRequest::new(4, &[id::IAS_ZONE, id::ON_OFF]))
        .bind(BindRequest::new(5, &[id::ON_OFF]))
        .reporting(reporting(
            1,
            id::POWER_CONFIG,
            power_config_attrs::BATTERY_VOLTAGE,
            DataType::Uint8,
            300,
            3600,
        ))
        .reporting(reporting(
            1,
            id::POWER_CONFIG,
            power_config_attrs::BATTERY_PERCENTAGE_REMAINING,
            DataType::Uint8,
            300,
            3600,
        ))
        .reporting(reporting(
            1,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
            0,
            300,
        ))
        .reporting(reporting(
            2,
            id::METERING,
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            DataType::Uint48,
            0,
            300,
        ));

    if let Some(ota) = ota {
        builder = builder.ota(ota);
    }
    builder.build()
}
