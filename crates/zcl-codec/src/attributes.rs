//! Global command payloads carrying attribute records

use crate::types::{read_uint, status, write_uint, AttributeValue, DataType, ProtocolError};
use serde::{Deserialize, Serialize};

/// An attribute id with a typed value, as carried by write requests and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub id: u16,
    pub value: AttributeValue,
}

impl AttributeRecord {
    #[must_use]
    pub fn new(id: u16, value: AttributeValue) -> Self {
        Self { id, value }
    }
}

/// One entry of a read attributes response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub id: u16,
    pub status: u8,
    /// Present only when `status` is success
    pub value: Option<AttributeValue>,
}

impl ReadRecord {
    #[must_use]
    pub fn success(id: u16, value: AttributeValue) -> Self {
        Self {
            id,
            status: status::SUCCESS,
            value: Some(value),
        }
    }

    #[must_use]
    pub fn unsupported(id: u16) -> Self {
        Self {
            id,
            status: status::UNSUPPORTED_ATTRIBUTE,
            value: None,
        }
    }
}

/// One entry of a configure reporting request (reported direction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingRecord {
    pub attribute: u16,
    pub data_type: DataType,
    pub min_interval: u16,
    pub max_interval: u16,
    pub reportable_change: u64,
}

/// Encode a read attributes request: a list of attribute ids
#[must_use]
pub fn encode_read_request(ids: &[u16]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.to_le_bytes()).collect()
}

/// Parse a read attributes request
#[allow(clippy::missing_errors_doc)]
pub fn parse_read_request(payload: &[u8]) -> Result<Vec<u16>, ProtocolError> {
    if payload.len() % 2 != 0 {
        return Err(ProtocolError::InvalidFrame(format!(
            "Read request length must be even, got {}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Encode attribute records (write attributes request or report attributes)
///
/// Record format: `[id: 2 LE][type: 1][value]`
#[allow(clippy::missing_errors_doc)]
pub fn encode_attribute_records(records: &[AttributeRecord]) -> Result<Vec<u8>, ProtocolError> {
    let mut data = Vec::new();
    for record in records {
        data.extend_from_slice(&record.id.to_le_bytes());
        data.push(record.value.data_type() as u8);
        record.value.encode(&mut data)?;
    }
    Ok(data)
}

/// Parse attribute records (write attributes request or report attributes)
#[allow(clippy::missing_errors_doc)]
pub fn parse_attribute_records(payload: &[u8]) -> Result<Vec<AttributeRecord>, ProtocolError> {
    let mut records = Vec::new();
    let mut idx = 0;

    while idx < payload.len() {
        if payload.len() < idx + 3 {
            return Err(ProtocolError::FrameTooShort(payload.len()));
        }
        let id = u16::from_le_bytes([payload[idx], payload[idx + 1]]);
        let data_type =
            DataType::try_from(payload[idx + 2]).map_err(ProtocolError::UnsupportedDataType)?;
        idx += 3;

        let (value, used) = AttributeValue::decode(data_type, &payload[idx..])?;
        idx += used;
        records.push(AttributeRecord { id, value });
    }

    Ok(records)
}

/// Encode a read attributes response
///
/// Record format: `[id: 2 LE][status: 1]` followed by `[type: 1][value]` on success
#[allow(clippy::missing_errors_doc)]
pub fn encode_read_response(records: &[ReadRecord]) -> Result<Vec<u8>, ProtocolError> {
    let mut data = Vec::new();
    for record in records {
        data.extend_from_slice(&record.id.to_le_bytes());
        match (&record.value, record.status) {
            (Some(value), status::SUCCESS) => {
                data.push(status::SUCCESS);
                data.push(value.data_type() as u8);
                value.encode(&mut data)?;
            }
            (_, status::SUCCESS) => {
                return Err(ProtocolError::InvalidFrame(format!(
                    "Successful read of {:#06x} has no value",
                    record.id
                )));
            }
            (_, failure) => data.push(failure),
        }
    }
    Ok(data)
}

/// Parse a read attributes response
#[allow(clippy::missing_errors_doc)]
pub fn parse_read_response(payload: &[u8]) -> Result<Vec<ReadRecord>, ProtocolError> {
    let mut records = Vec::new();
    let mut idx = 0;

    while idx < payload.len() {
        if payload.len() < idx + 3 {
            return Err(ProtocolError::FrameTooShort(payload.len()));
        }
        let id = u16::from_le_bytes([payload[idx], payload[idx + 1]]);
        let record_status = payload[idx + 2];
        idx += 3;

        if record_status != status::SUCCESS {
            tracing::trace!(
                "Read of attribute 0x{:04X} failed with status 0x{:02X}",
                id,
                record_status
            );
            records.push(ReadRecord {
                id,
                status: record_status,
                value: None,
            });
            continue;
        }

        let type_id = *payload
            .get(idx)
            .ok_or(ProtocolError::FrameTooShort(payload.len()))?;
        let data_type = DataType::try_from(type_id).map_err(ProtocolError::UnsupportedDataType)?;
        idx += 1;

        let (value, used) = AttributeValue::decode(data_type, &payload[idx..])?;
        idx += used;
        records.push(ReadRecord::success(id, value));
    }

    Ok(records)
}

/// Encode a configure reporting request
///
/// Record format: `[direction: 1][id: 2 LE][type: 1][min: 2 LE][max: 2 LE]`
/// followed by the reportable change (analog types only, in the attribute's width)
#[allow(clippy::missing_errors_doc)]
pub fn encode_configure_reporting(records: &[ReportingRecord]) -> Result<Vec<u8>, ProtocolError> {
    let mut data = Vec::new();
    for record in records {
        data.push(0x00); // Attribute is reported by the server
        data.extend_from_slice(&record.attribute.to_le_bytes());
        data.push(record.data_type as u8);
        data.extend_from_slice(&record.min_interval.to_le_bytes());
        data.extend_from_slice(&record.max_interval.to_le_bytes());
        if record.data_type.is_analog() {
            let width = record
                .data_type
                .width()
                .ok_or(ProtocolError::UnsupportedDataType(record.data_type as u8))?;
            write_uint(&mut data, record.reportable_change, width);
        }
    }
    Ok(data)
}

/// Parse a configure reporting request (reported direction only)
#[allow(clippy::missing_errors_doc)]
pub fn parse_configure_reporting(payload: &[u8]) -> Result<Vec<ReportingRecord>, ProtocolError> {
    let mut records = Vec::new();
    let mut idx = 0;

    while idx < payload.len() {
        if payload.len() < idx + 8 {
            return Err(ProtocolError::FrameTooShort(payload.len()));
        }
        if payload[idx] != 0x00 {
            return Err(ProtocolError::InvalidFrame(format!(
                "Unsupported reporting direction {:#04x}",
                payload[idx]
            )));
        }
        let attribute = u16::from_le_bytes([payload[idx + 1], payload[idx + 2]]);
        let data_type =
            DataType::try_from(payload[idx + 3]).map_err(ProtocolError::UnsupportedDataType)?;
        let min_interval = u16::from_le_bytes([payload[idx + 4], payload[idx + 5]]);
        let max_interval = u16::from_le_bytes([payload[idx + 6], payload[idx + 7]]);
        idx += 8;

        let reportable_change = match data_type.width() {
            Some(width) if data_type.is_analog() => {
                let change = read_uint(&payload[idx..], width)?;
                idx += width;
                change
            }
            _ => 0,
        };

        records.push(ReportingRecord {
            attribute,
            data_type,
            min_interval,
            max_interval,
            reportable_change,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_encoding() {
        assert_eq!(encode_read_request(&[0x0000, 0xF002]), vec![0x00, 0x00, 0x02, 0xF0]);
        assert_eq!(parse_read_request(&[0x21, 0x00]).unwrap(), vec![0x0021]);
        assert!(parse_read_request(&[0x21]).is_err());
    }

    #[test]
    fn test_parse_metering_report() {
        // currentSummDelivered (0x0000), uint48, 1500 litres
        let payload = [0x00, 0x00, 0x25, 0xDC, 0x05, 0x00, 0x00, 0x00, 0x00];
        let records = parse_attribute_records(&payload).unwrap();
        assert_eq!(
            records,
            vec![AttributeRecord::new(0x0000, AttributeValue::Uint48(1500))]
        );
    }

    #[test]
    fn test_write_request_layout() {
        let records = vec![
            AttributeRecord::new(0xF000, AttributeValue::Uint8(1)),
            AttributeRecord::new(0xF002, AttributeValue::Uint16(75)),
        ];
        let payload = encode_attribute_records(&records).unwrap();
        assert_eq!(
            payload,
            vec![0x00, 0xF0, 0x20, 0x01, 0x02, 0xF0, 0x21, 0x4B, 0x00]
        );
        assert_eq!(parse_attribute_records(&payload).unwrap(), records);
    }

    #[test]
    fn test_parse_unknown_type() {
        let result = parse_attribute_records(&[0x00, 0x00, 0xE2, 0x00]);
        assert!(matches!(result, Err(ProtocolError::UnsupportedDataType(0xE2))));
    }

    #[test]
    fn test_read_response_with_failure() {
        let records = vec![
            ReadRecord::success(0x0020, AttributeValue::Uint8(30)),
            ReadRecord::unsupported(0x0099),
        ];
        let payload = encode_read_response(&records).unwrap();
        assert_eq!(
            payload,
            vec![0x20, 0x00, 0x00, 0x20, 0x1E, 0x99, 0x00, 0x86]
        );
        assert_eq!(parse_read_response(&payload).unwrap(), records);
    }

    #[test]
    fn test_configure_reporting() {
        let records = vec![
            ReportingRecord {
                attribute: 0x0020,
                data_type: DataType::Uint8,
                min_interval: 300,
                max_interval: 3600,
                reportable_change: 0,
            },
            ReportingRecord {
                attribute: 0x0002,
                data_type: DataType::Bitmap16,
                min_interval: 0,
                max_interval: 60,
                reportable_change: 0,
            },
        ];
        let payload = encode_configure_reporting(&records).unwrap();
        // Analog record carries a 1-byte change, the bitmap record none
        assert_eq!(payload.len(), 9 + 8);
        assert_eq!(&payload[..4], &[0x00, 0x20, 0x00, 0x20]);
        assert_eq!(parse_configure_reporting(&payload).unwrap(), records);
    }
}
