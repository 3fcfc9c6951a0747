//! Converter bridge: bound devices, inbound decoding and outbound commands

use crate::decoder;
use crate::device::{format_ieee_address, BoundDevice};
use crate::encoder::{self, EncodeOutcome};
use crate::error::ConverterError;
use crate::persistence::BindingStore;
use crate::profile::DeviceProfile;
use crate::registry::ProfileRegistry;
use crate::report::RawAttributeReport;
use crate::transport::{
    DeviceTransport, InboundFrame, PendingCommand, TransportError, TransportFuture,
    WriteRequest,
};
use crate::value::{CommandValue, StateUpdate};
use dashmap::DashMap;
use futures::future::FutureExt;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use zcl_codec::ZclFrame;

/// Bridge events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    DeviceBound {
        ieee_address: String,
        model_id: String,
    },
    DeviceUnbound {
        ieee_address: String,
    },
    /// Decoded telemetry, or the echo of an applied set
    StateChanged {
        ieee_address: String,
        state: StateUpdate,
    },
}

/// A set command handed to the transport
#[derive(Debug)]
pub struct SetCommand {
    /// State published once the write completes; empty when the set was ignored
    pub state: StateUpdate,
    pub pending: PendingCommand,
}

impl SetCommand {
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.state.is_empty()
    }
}

/// A validated batch of set commands
#[derive(Debug)]
pub struct SetBatch {
    pub state: StateUpdate,
    /// Keys that take no writes
    pub ignored: Vec<String>,
    pub pending: PendingCommand,
}

/// Connects device telemetry and commands to the profile tables
#[derive(Clone)]
pub struct ConverterBridge {
    registry: Arc<ProfileRegistry>,
    transport: Arc<dyn DeviceTransport>,
    /// Bound devices (keyed by IEEE address)
    devices: Arc<DashMap<[u8; 8], BoundDevice>>,
    event_tx: broadcast::Sender<BridgeEvent>,
    /// Bindings file, absent for in-memory bridges
    store: Option<Arc<BindingStore>>,
}

impl ConverterBridge {
    /// Create a bridge persisting bindings to `data_dir/devices.json`
    pub async fn new(
        registry: Arc<ProfileRegistry>,
        transport: Arc<dyn DeviceTransport>,
        data_dir: &Path,
    ) -> Self {
        let store = Arc::new(BindingStore::new(data_dir));
        let bridge = Self {
            store: Some(store.clone()),
            ..Self::in_memory(registry, transport)
        };

        for device in store.load(&bridge.registry).await {
            bridge.devices.insert(device.ieee_address, device);
        }

        bridge
    }

    /// Create a bridge without persistence
    #[must_use]
    pub fn in_memory(registry: Arc<ProfileRegistry>, transport: Arc<dyn DeviceTransport>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            registry,
            transport,
            devices: Arc::new(DashMap::new()),
            event_tx,
            store: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Subscribe to bridge events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    /// Bind a device to the profile matching `model_id`
    #[allow(clippy::missing_errors_doc)]
    pub fn bind_device(
        &self,
        ieee_address: [u8; 8],
        model_id: &str,
        friendly_name: Option<String>,
    ) -> Result<BoundDevice, ConverterError> {
        if self.registry.lookup(model_id).is_none() {
            return Err(ConverterError::ProfileNotFound(model_id.to_string()));
        }

        let mut device = BoundDevice::new(ieee_address, model_id);
        device.friendly_name = friendly_name;
        self.devices.insert(ieee_address, device.clone());

        tracing::info!(
            "Bound device {} to model {}",
            device.ieee_address_string(),
            model_id
        );
        self.emit(BridgeEvent::DeviceBound {
            ieee_address: device.ieee_address_string(),
            model_id: model_id.to_string(),
        });
        self.persist();
        Ok(device)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn unbind_device(&self, ieee_address: [u8; 8]) -> Result<BoundDevice, ConverterError> {
        let (_, device) = self
            .devices
            .remove(&ieee_address)
            .ok_or_else(|| ConverterError::DeviceNotFound(format_ieee_address(&ieee_address)))?;

        tracing::info!("Unbound device {}", device.display_name());
        self.emit(BridgeEvent::DeviceUnbound {
            ieee_address: device.ieee_address_string(),
        });
        self.persist();
        Ok(device)
    }

    #[must_use]
    pub fn devices(&self) -> Vec<BoundDevice> {
        self.devices.iter().map(|r| r.value().clone()).collect()
    }

    #[must_use]
    pub fn device(&self, ieee_address: [u8; 8]) -> Option<BoundDevice> {
        self.devices.get(&ieee_address).map(|r| r.value().clone())
    }

    /// Profile of a bound device
    #[allow(clippy::missing_errors_doc)]
    pub fn profile_for(&self, ieee_address: [u8; 8]) -> Result<Arc<DeviceProfile>, ConverterError> {
        let device = self
            .devices
            .get(&ieee_address)
            .ok_or_else(|| ConverterError::DeviceNotFound(format_ieee_address(&ieee_address)))?;
        self.registry
            .lookup(&device.model_id)
            .ok_or_else(|| ConverterError::ProfileNotFound(device.model_id.clone()))
    }

    /// Decode a report from a bound device and publish the result
    #[allow(clippy::missing_errors_doc)]
    pub fn handle_report(
        &self,
        ieee_address: [u8; 8],
        report: &RawAttributeReport,
    ) -> Result<StateUpdate, ConverterError> {
        let profile = self.profile_for(ieee_address)?;
        if let Some(mut device) = self.devices.get_mut(&ieee_address) {
            device.last_seen = Some(Instant::now());
        }

        let update = decoder::decode(report, &profile);
        if !update.is_empty() {
            tracing::debug!(
                "State update from {}: {:?}",
                format_ieee_address(&ieee_address),
                update
            );
            self.emit(BridgeEvent::StateChanged {
                ieee_address: format_ieee_address(&ieee_address),
                state: update.clone(),
            });
        }
        Ok(update)
    }

    /// Parse a raw ZCL frame and handle it as a report
    #[allow(clippy::missing_errors_doc)]
    pub fn handle_frame(&self, frame: &InboundFrame) -> Result<StateUpdate, ConverterError> {
        let zcl = ZclFrame::parse(&frame.data)?;
        match RawAttributeReport::from_frame(frame.cluster, frame.endpoint, &zcl)? {
            Some(report) => self.handle_report(frame.ieee_address, &report),
            None => {
                tracing::debug!(
                    "Frame {:#04x} on cluster {:#06x} carries no telemetry",
                    zcl.command_id(),
                    frame.cluster
                );
                Ok(StateUpdate::new())
            }
        }
    }

    /// Request a field's current value; the answer arrives as a report
    #[allow(clippy::missing_errors_doc)]
    pub fn get(&self, ieee_address: [u8; 8], key: &str) -> Result<PendingCommand, ConverterError> {
        let profile = self.profile_for(ieee_address)?;
        let request = encoder::encode_get(key, &profile)?;
        tracing::debug!(
            "Reading {:?} from endpoint {} of {}",
            request.attributes,
            request.endpoint,
            format_ieee_address(&ieee_address)
        );
        Ok(PendingCommand::new(
            self.transport.read(ieee_address, request),
        ))
    }

    /// Encode and send a set command
    ///
    /// The state echo is published when the write completes, so the
    /// returned command must be awaited or detached.
    #[allow(clippy::missing_errors_doc)]
    pub fn set(
        &self,
        ieee_address: [u8; 8],
        key: &str,
        value: &CommandValue,
    ) -> Result<SetCommand, ConverterError> {
        let profile = self.profile_for(ieee_address)?;
        let (requests, state) = match encoder::encode_set(key, value, &profile)? {
            EncodeOutcome::Write { requests, state } => (requests, state),
            EncodeOutcome::Ignored { .. } => {
                return Ok(SetCommand {
                    state: StateUpdate::new(),
                    pending: PendingCommand::completed(),
                })
            }
        };

        let pending = self.dispatch(ieee_address, requests, state.clone());
        Ok(SetCommand { state, pending })
    }

    /// Encode a batch of set commands, sending nothing unless every one encodes
    ///
    /// Writes go out in batch order and a single state echo covering the
    /// whole batch is published once they all complete.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_many(
        &self,
        ieee_address: [u8; 8],
        commands: &[(String, CommandValue)],
    ) -> Result<SetBatch, ConverterError> {
        let profile = self.profile_for(ieee_address)?;
        let mut requests = Vec::new();
        let mut state = StateUpdate::new();
        let mut ignored = Vec::new();

        for (key, value) in commands {
            match encoder::encode_set(key, value, &profile)? {
                EncodeOutcome::Write {
                    requests: writes,
                    state: echo,
                } => {
                    requests.extend(writes);
                    state.extend(echo);
                }
                EncodeOutcome::Ignored { key } => ignored.push(key),
            }
        }

        let pending = if requests.is_empty() {
            PendingCommand::completed()
        } else {
            self.dispatch(ieee_address, requests, state.clone())
        };
        Ok(SetBatch {
            state,
            ignored,
            pending,
        })
    }

    /// Send writes, then publish `state` once all of them complete
    fn dispatch(
        &self,
        ieee_address: [u8; 8],
        requests: Vec<WriteRequest>,
        state: StateUpdate,
    ) -> PendingCommand {
        let writes: Vec<TransportFuture> = requests
            .into_iter()
            .map(|request| self.transport.write(ieee_address, request))
            .collect();
        let event_tx = self.event_tx.clone();
        let echo = BridgeEvent::StateChanged {
            ieee_address: format_ieee_address(&ieee_address),
            state,
        };
        let pending = PendingCommand::sequence(writes);
        PendingCommand::new(
            async move {
                pending.await?;
                let _ = event_tx.send(echo);
                Ok::<(), TransportError>(())
            }
            .boxed(),
        )
    }

    /// Run the profile's configure steps: reads, binds, then reporting
    #[allow(clippy::missing_errors_doc)]
    pub fn configure(&self, ieee_address: [u8; 8]) -> Result<PendingCommand, ConverterError> {
        let profile = self.profile_for(ieee_address)?;
        let steps = profile.configure_steps();
        tracing::info!(
            "Configuring {} as {}",
            format_ieee_address(&ieee_address),
            profile.model()
        );

        let mut requests = Vec::new();
        for read in &steps.reads {
            requests.push(self.transport.read(ieee_address, read.clone()));
        }
        for bind in &steps.binds {
            requests.push(self.transport.bind(ieee_address, bind.clone()));
        }
        for config in &steps.reporting {
            requests.push(
                self.transport
                    .configure_reporting(ieee_address, config.clone()),
            );
        }
        Ok(PendingCommand::sequence(requests))
    }

    /// Decode frames from the transport in the background
    pub fn spawn_frame_listener(
        &self,
        mut frames: broadcast::Receiver<InboundFrame>,
    ) -> tokio::task::JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(frame) => {
                        if let Err(e) = bridge.handle_frame(&frame) {
                            tracing::warn!(
                                "Failed to handle frame from {}: {}",
                                format_ieee_address(&frame.ieee_address),
                                e
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Frame listener lagged, {} frames dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Frame source closed, stopping listener");
                        break;
                    }
                }
            }
        })
    }

    fn emit(&self, event: BridgeEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn persist(&self) {
        if let Some(ref store) = self.store {
            let devices = self.devices();
            let store = store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.save(&devices).await {
                    tracing::warn!("Failed to save devices: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{id, metering_attrs};
    use crate::loopback::LoopbackTransport;
    use crate::report::ReportType;
    use crate::value::{RawValue, StateValue};
    use std::time::Duration;
    use zcl_codec::commands::ias_zone;
    use zcl_codec::{AttributeRecord, AttributeValue, OnOffCommand};

    const IEEE: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    fn setup(model_id: &str) -> (ConverterBridge, Arc<LoopbackTransport>) {
        let registry = Arc::new(ProfileRegistry::builtin(None).unwrap());
        let transport = Arc::new(LoopbackTransport::new());
        let bridge = ConverterBridge::in_memory(registry, transport.clone());
        bridge.bind_device(IEEE, model_id, None).unwrap();
        (bridge, transport)
    }

    async fn next_state(events: &mut broadcast::Receiver<BridgeEvent>) -> StateUpdate {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .expect("no event within a second")
                .unwrap();
            if let BridgeEvent::StateChanged { state, .. } = event {
                return state;
            }
        }
    }

    #[tokio::test]
    async fn test_preset_loopback_round_trip() {
        let (bridge, transport) = setup("Watermeter_TLSR8258_Preset");
        bridge.spawn_frame_listener(transport.subscribe());
        let mut events = bridge.subscribe();

        for (key, raw, expected) in [
            ("hot_water_preset", "ON", 1u64),
            ("cold_water_preset", "200", 200),
            ("step_water_preset", "1000", 1000),
        ] {
            let command = bridge
                .set(IEEE, key, &CommandValue::parse(raw))
                .unwrap();
            assert!(!command.is_ignored());
            command.pending.await.unwrap();
            assert_eq!(next_state(&mut events).await[key], StateValue::Unsigned(expected));

            bridge.get(IEEE, key).unwrap().await.unwrap();
            let state = next_state(&mut events).await;
            assert_eq!(state[key], StateValue::Unsigned(expected));
        }

        assert_eq!(
            transport.attribute(IEEE, 3, id::METERING, metering_attrs::STEP_WATER_PRESET),
            Some(AttributeValue::Uint16(1000))
        );
    }

    #[tokio::test]
    async fn test_report_frame_decoded() {
        let (bridge, transport) = setup("Watermeter_TLSR8258");
        bridge.spawn_frame_listener(transport.subscribe());
        let mut events = bridge.subscribe();

        transport
            .emit_report(
                IEEE,
                1,
                id::METERING,
                &[AttributeRecord::new(
                    metering_attrs::CURRENT_SUMMATION_DELIVERED,
                    AttributeValue::Uint48(1500),
                )],
            )
            .unwrap();
        let state = next_state(&mut events).await;
        assert_eq!(state["volume_1"], StateValue::Unsigned(1500));
        assert!(bridge.device(IEEE).unwrap().last_seen.is_some());
    }

    #[tokio::test]
    async fn test_ignored_set() {
        let (bridge, transport) = setup("Watermeter_TLSR8258");
        let command = bridge
            .set(IEEE, "volume_1", &CommandValue::parse("5"))
            .unwrap();
        assert!(command.is_ignored());
        command.pending.await.unwrap();
        assert!(transport
            .attribute(IEEE, 1, id::METERING, metering_attrs::CURRENT_SUMMATION_DELIVERED)
            .is_none());
    }

    #[tokio::test]
    async fn test_counter_calibration() {
        let (bridge, transport) = setup("Watermeter_TLSR8258");
        bridge
            .set(IEEE, "currentsummdelivered_1", &CommandValue::parse("123456"))
            .unwrap()
            .pending
            .await
            .unwrap();
        assert_eq!(
            transport.attribute(IEEE, 1, id::METERING, metering_attrs::CURRENT_SUMMATION_DELIVERED),
            Some(AttributeValue::Uint48(123_456))
        );
    }

    #[tokio::test]
    async fn test_invalid_value_sends_nothing() {
        let (bridge, transport) = setup("Watermeter_TLSR8258_Preset");
        let result = bridge.set(IEEE, "hot_water_preset", &CommandValue::parse("abc"));
        assert!(matches!(result, Err(ConverterError::InvalidValue { .. })));
        assert!(transport
            .attribute(IEEE, 3, id::METERING, metering_attrs::HOT_WATER_PRESET)
            .is_none());
    }

    #[tokio::test]
    async fn test_set_many_all_or_nothing() {
        let (bridge, transport) = setup("Watermeter_TLSR8258_Preset");
        let commands = vec![
            ("cold_water_preset".to_string(), CommandValue::parse("5")),
            ("hot_water_preset".to_string(), CommandValue::parse("abc")),
        ];
        assert!(matches!(
            bridge.set_many(IEEE, &commands),
            Err(ConverterError::InvalidValue { .. })
        ));
        assert!(transport
            .attribute(IEEE, 3, id::METERING, metering_attrs::COLD_WATER_PRESET)
            .is_none());

        let mut events = bridge.subscribe();
        let commands = vec![
            ("cold_water_preset".to_string(), CommandValue::parse("5")),
            ("hot_water_preset".to_string(), CommandValue::parse("on")),
            ("volume_2".to_string(), CommandValue::parse("1")),
        ];
        let batch = bridge.set_many(IEEE, &commands).unwrap();
        assert_eq!(batch.ignored, vec!["volume_2".to_string()]);
        batch.pending.await.unwrap();

        let state = next_state(&mut events).await;
        assert_eq!(state["cold_water_preset"], StateValue::Unsigned(5));
        assert_eq!(state["hot_water_preset"], StateValue::Unsigned(1));
        assert_eq!(
            transport.attribute(IEEE, 3, id::METERING, metering_attrs::COLD_WATER_PRESET),
            Some(AttributeValue::Uint8(5))
        );
    }

    #[tokio::test]
    async fn test_device_commands_decoded() {
        let (bridge, transport) = setup("Watermeter_TLSR8258_wleak");
        bridge.spawn_frame_listener(transport.subscribe());
        let mut events = bridge.subscribe();

        transport.emit_command(IEEE, 4, id::ON_OFF, OnOffCommand::On as u8, Vec::new());
        let state = next_state(&mut events).await;
        assert_eq!(state["action"], StateValue::Text("on_4".to_string()));

        transport.emit_command(IEEE, 5, id::ON_OFF, OnOffCommand::Off as u8, Vec::new());
        let state = next_state(&mut events).await;
        assert_eq!(state["action"], StateValue::Text("off_5".to_string()));

        // Zone status: alarm1 | battery low, extended status, zone id, delay
        transport.emit_command(
            IEEE,
            4,
            id::IAS_ZONE,
            ias_zone::STATUS_CHANGE_NOTIFICATION,
            vec![0x09, 0x00, 0x00, 0x01, 0x00, 0x00],
        );
        let state = next_state(&mut events).await;
        assert_eq!(state["water_leak"], StateValue::Bool(true));
        assert_eq!(state["battery_low"], StateValue::Bool(true));
        assert_eq!(state["tamper"], StateValue::Bool(false));
    }

    #[tokio::test]
    async fn test_unreachable_device() {
        let (bridge, transport) = setup("Watermeter_TLSR8258_Preset");
        transport.set_reachable(false);
        let result = bridge
            .set(IEEE, "hot_water_preset", &CommandValue::parse("OFF"))
            .unwrap()
            .pending
            .await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_configure() {
        let (bridge, transport) = setup("Watermeter_TLSR8258_wleak");
        bridge.configure(IEEE).unwrap().await.unwrap();

        let profile = bridge.profile_for(IEEE).unwrap();
        assert_eq!(
            transport.bindings(IEEE),
            profile.configure_steps().binds.clone()
        );
        assert_eq!(
            transport.reporting(IEEE),
            profile.configure_steps().reporting.clone()
        );
    }

    #[tokio::test]
    async fn test_unbound_device() {
        let registry = Arc::new(ProfileRegistry::builtin(None).unwrap());
        let bridge = ConverterBridge::in_memory(registry, Arc::new(LoopbackTransport::new()));
        let report = RawAttributeReport::new(id::METERING, 1, ReportType::AttributeReport)
            .with_attribute(
                metering_attrs::CURRENT_SUMMATION_DELIVERED,
                RawValue::Words(0, 1),
            );
        assert!(matches!(
            bridge.handle_report(IEEE, &report),
            Err(ConverterError::DeviceNotFound(_))
        ));
        assert!(matches!(
            bridge.bind_device(IEEE, "lumi.weather", None),
            Err(ConverterError::ProfileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_and_unbind_events() {
        let registry = Arc::new(ProfileRegistry::builtin(None).unwrap());
        let bridge = ConverterBridge::in_memory(registry, Arc::new(LoopbackTransport::new()));
        let mut events = bridge.subscribe();

        bridge
            .bind_device(IEEE, "Watermeter_TLSR8258", Some("Kitchen".to_string()))
            .unwrap();
        assert_eq!(bridge.devices().len(), 1);
        bridge.unbind_device(IEEE).unwrap();
        assert!(bridge.devices().is_empty());
        assert!(bridge.unbind_device(IEEE).is_err());

        assert!(matches!(
            events.recv().await.unwrap(),
            BridgeEvent::DeviceBound { .. }
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            BridgeEvent::DeviceUnbound {
                ieee_address: "08:07:06:05:04:03:02:01".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bindings_loaded_from_data_dir() {
        let dir = std::env::temp_dir().join(format!("watermeter-bridge-{}", std::process::id()));
        let known = BoundDevice::new(IEEE, "Watermeter_TLSR8258_wleak");
        let unknown = BoundDevice::new([9; 8], "Some_Other_Meter");
        BindingStore::new(&dir)
            .save(&[known, unknown])
            .await
            .unwrap();

        let registry = Arc::new(ProfileRegistry::builtin(None).unwrap());
        let bridge =
            ConverterBridge::new(registry, Arc::new(LoopbackTransport::new()), &dir).await;
        assert_eq!(bridge.devices().len(), 1);
        assert!(bridge.profile_for(IEEE).is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
