//! Simulated device reachable through the transport contract
//!
//! Every request is serialized to ZCL bytes and parsed back on the "device"
//! side, so the loopback exercises the same wire encoding a radio would.
//! Read responses and reports come back as [`InboundFrame`]s.

use crate::transport::{
    BindRequest, DeviceTransport, InboundFrame, ReadRequest, ReportingConfig, TransportError,
    TransportFuture, WriteRequest,
};
use dashmap::DashMap;
use futures::future::{self, FutureExt};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::broadcast;
use zcl_codec::attributes::{
    encode_attribute_records, encode_configure_reporting, encode_read_request,
    encode_read_response, parse_attribute_records, parse_configure_reporting, parse_read_request,
};
use zcl_codec::{AttributeRecord, AttributeValue, GlobalCommand, ReadRecord, ZclFrame};

/// (device, endpoint, cluster, attribute)
type AttributeKey = ([u8; 8], u8, u16, u16);

/// In-memory stand-in for one or more devices
pub struct LoopbackTransport {
    attributes: DashMap<AttributeKey, AttributeValue>,
    bindings: DashMap<[u8; 8], Vec<BindRequest>>,
    reporting: DashMap<[u8; 8], Vec<ReportingConfig>>,
    frame_tx: broadcast::Sender<InboundFrame>,
    seq: AtomicU8,
    reachable: AtomicBool,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        let (frame_tx, _) = broadcast::channel(64);
        Self {
            attributes: DashMap::new(),
            bindings: DashMap::new(),
            reporting: DashMap::new(),
            frame_tx,
            seq: AtomicU8::new(0),
            reachable: AtomicBool::new(true),
        }
    }

    /// Frames sent by the simulated devices
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundFrame> {
        self.frame_tx.subscribe()
    }

    /// Preload an attribute value
    pub fn seed(
        &self,
        ieee_address: [u8; 8],
        endpoint: u8,
        cluster: u16,
        attribute: u16,
        value: AttributeValue,
    ) {
        self.attributes
            .insert((ieee_address, endpoint, cluster, attribute), value);
    }

    /// Current value of an attribute on the simulated device
    #[must_use]
    pub fn attribute(
        &self,
        ieee_address: [u8; 8],
        endpoint: u8,
        cluster: u16,
        attribute: u16,
    ) -> Option<AttributeValue> {
        self.attributes
            .get(&(ieee_address, endpoint, cluster, attribute))
            .map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn bindings(&self, ieee_address: [u8; 8]) -> Vec<BindRequest> {
        self.bindings
            .get(&ieee_address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn reporting(&self, ieee_address: [u8; 8]) -> Vec<ReportingConfig> {
        self.reporting
            .get(&ieee_address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Simulate the device dropping off the network (or coming back)
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Send an unsolicited attribute report from the device
    #[allow(clippy::missing_errors_doc)]
    pub fn emit_report(
        &self,
        ieee_address: [u8; 8],
        endpoint: u8,
        cluster: u16,
        records: &[AttributeRecord],
    ) -> Result<(), TransportError> {
        let payload = encode_attribute_records(records)?;
        let frame = ZclFrame::global(self.next_seq(), GlobalCommand::ReportAttributes, payload)
            .from_server();
        self.emit(ieee_address, endpoint, cluster, &frame);
        Ok(())
    }

    /// Send a cluster-specific command from the device (button press, zone status)
    pub fn emit_command(
        &self,
        ieee_address: [u8; 8],
        endpoint: u8,
        cluster: u16,
        command_id: u8,
        payload: Vec<u8>,
    ) {
        let frame = ZclFrame::cluster_command(self.next_seq(), command_id, payload).from_server();
        self.emit(ieee_address, endpoint, cluster, &frame);
    }

    fn emit(&self, ieee_address: [u8; 8], endpoint: u8, cluster: u16, frame: &ZclFrame) {
        let inbound = InboundFrame {
            ieee_address,
            endpoint,
            cluster,
            data: frame.serialize(),
        };
        if self.frame_tx.send(inbound).is_err() {
            tracing::debug!("No listener for loopback frame from endpoint {}", endpoint);
        }
    }

    fn next_seq(&self) -> u8 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn check_reachable(&self, ieee_address: [u8; 8]) -> Result<(), TransportError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unreachable(
                crate::device::format_ieee_address(&ieee_address),
            ))
        }
    }

    fn handle_write(
        &self,
        ieee_address: [u8; 8],
        request: &WriteRequest,
    ) -> Result<(), TransportError> {
        self.check_reachable(ieee_address)?;

        let payload = encode_attribute_records(&request.attributes)?;
        let frame = ZclFrame::global(self.next_seq(), GlobalCommand::WriteAttributes, payload);

        // Device side
        let received = ZclFrame::parse(&frame.serialize())?;
        for record in parse_attribute_records(received.payload())? {
            tracing::debug!(
                "Loopback write {:#06x}={:?} on endpoint {}",
                record.id,
                record.value,
                request.endpoint
            );
            self.seed(
                ieee_address,
                request.endpoint,
                request.cluster,
                record.id,
                record.value,
            );
        }
        Ok(())
    }

    fn handle_read(&self, ieee_address: [u8; 8], request: &ReadRequest) -> Result<(), TransportError> {
        self.check_reachable(ieee_address)?;

        let frame = ZclFrame::global(
            self.next_seq(),
            GlobalCommand::ReadAttributes,
            encode_read_request(&request.attributes),
        );

        // Device side
        let received = ZclFrame::parse(&frame.serialize())?;
        let records: Vec<ReadRecord> = parse_read_request(received.payload())?
            .into_iter()
            .map(|id| {
                match self.attribute(ieee_address, request.endpoint, request.cluster, id) {
                    Some(value) => ReadRecord::success(id, value),
                    None => ReadRecord::unsupported(id),
                }
            })
            .collect();

        let response = ZclFrame::global(
            received.transaction_seq(),
            GlobalCommand::ReadAttributesResponse,
            encode_read_response(&records)?,
        )
        .from_server();
        self.emit(ieee_address, request.endpoint, request.cluster, &response);
        Ok(())
    }

    fn handle_configure_reporting(
        &self,
        ieee_address: [u8; 8],
        config: ReportingConfig,
    ) -> Result<(), TransportError> {
        self.check_reachable(ieee_address)?;

        let payload = encode_configure_reporting(std::slice::from_ref(&config.record))?;
        let frame = ZclFrame::global(self.next_seq(), GlobalCommand::ConfigureReporting, payload);

        // Device side
        let received = ZclFrame::parse(&frame.serialize())?;
        let records = parse_configure_reporting(received.payload())?;
        self.reporting
            .entry(ieee_address)
            .or_default()
            .extend(records.into_iter().map(|record| ReportingConfig {
                endpoint: config.endpoint,
                cluster: config.cluster,
                record,
            }));
        Ok(())
    }
}

impl DeviceTransport for LoopbackTransport {
    fn write(&self, ieee_address: [u8; 8], request: WriteRequest) -> TransportFuture {
        future::ready(self.handle_write(ieee_address, &request)).boxed()
    }

    fn read(&self, ieee_address: [u8; 8], request: ReadRequest) -> TransportFuture {
        future::ready(self.handle_read(ieee_address, &request)).boxed()
    }

    fn bind(&self, ieee_address: [u8; 8], request: BindRequest) -> TransportFuture {
        let result = self.check_reachable(ieee_address).map(|()| {
            self.bindings.entry(ieee_address).or_default().push(request);
        });
        future::ready(result).boxed()
    }

    fn configure_reporting(
        &self,
        ieee_address: [u8; 8],
        config: ReportingConfig,
    ) -> TransportFuture {
        future::ready(self.handle_configure_reporting(ieee_address, config)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{id, metering_attrs};
    use crate::report::{RawAttributeReport, ReportType};
    use crate::value::RawValue;

    const IEEE: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];

    #[tokio::test]
    async fn test_write_then_read() {
        let transport = LoopbackTransport::new();
        let mut frames = transport.subscribe();

        transport
            .write(
                IEEE,
                WriteRequest {
                    endpoint: 3,
                    cluster: id::METERING,
                    attributes: vec![AttributeRecord::new(
                        metering_attrs::STEP_WATER_PRESET,
                        AttributeValue::Uint16(75),
                    )],
                },
            )
            .await
            .unwrap();
        assert_eq!(
            transport.attribute(IEEE, 3, id::METERING, metering_attrs::STEP_WATER_PRESET),
            Some(AttributeValue::Uint16(75))
        );

        transport
            .read(
                IEEE,
                ReadRequest::new(3, id::METERING, &[metering_attrs::STEP_WATER_PRESET]),
            )
            .await
            .unwrap();

        let inbound = frames.recv().await.unwrap();
        assert_eq!(inbound.endpoint, 3);
        let frame = ZclFrame::parse(&inbound.data).unwrap();
        let report = RawAttributeReport::from_frame(inbound.cluster, inbound.endpoint, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(report.report_type, ReportType::ReadResponse);
        assert_eq!(
            report.attribute(metering_attrs::STEP_WATER_PRESET),
            Some(&RawValue::Integer(75))
        );
    }

    #[tokio::test]
    async fn test_unreachable() {
        let transport = LoopbackTransport::new();
        transport.set_reachable(false);
        let result = transport
            .bind(IEEE, BindRequest::new(1, &[id::METERING]))
            .await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
        assert!(transport.bindings(IEEE).is_empty());
    }

    #[tokio::test]
    async fn test_configure_reporting_stored() {
        let transport = LoopbackTransport::new();
        let config = ReportingConfig {
            endpoint: 1,
            cluster: id::METERING,
            record: zcl_codec::ReportingRecord {
                attribute: metering_attrs::CURRENT_SUMMATION_DELIVERED,
                data_type: zcl_codec::DataType::Uint48,
                min_interval: 0,
                max_interval: 300,
                reportable_change: 0,
            },
        };
        transport
            .configure_reporting(IEEE, config.clone())
            .await
            .unwrap();
        assert_eq!(transport.reporting(IEEE), vec![config]);
    }

    #[tokio::test]
    async fn test_emit_report() {
        let transport = LoopbackTransport::new();
        let mut frames = transport.subscribe();
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
        let inbound = frames.recv().await.unwrap();
        let frame = ZclFrame::parse(&inbound.data).unwrap();
        assert!(frame.is_from_server());
        assert_eq!(frame.global_command(), Some(GlobalCommand::ReportAttributes));
    }
}
