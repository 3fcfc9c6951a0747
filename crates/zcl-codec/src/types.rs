//! Common types used throughout the codec

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Unknown command ID: {0:#04X}")]
    UnknownCommand(u8),

    #[error("Unsupported data type: {0:#04X}")]
    UnsupportedDataType(u8),

    #[error("Value {value} out of range for {data_type:?}")]
    ValueOutOfRange { data_type: DataType, value: i64 },
}

/// ZCL status codes used in read responses
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const UNSUPPORTED_ATTRIBUTE: u8 = 0x86;
}

/// ZCL data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    NoData = 0x00,
    Boolean = 0x10,
    Bitmap8 = 0x18,
    Bitmap16 = 0x19,
    Uint8 = 0x20,
    Uint16 = 0x21,
    Uint24 = 0x22,
    Uint32 = 0x23,
    Uint48 = 0x25,
    Uint64 = 0x27,
    Int8 = 0x28,
    Int16 = 0x29,
    Int32 = 0x2B,
    Enum8 = 0x30,
    Enum16 = 0x31,
    CharString = 0x42,
}

impl TryFrom<u8> for DataType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(DataType::NoData),
            0x10 => Ok(DataType::Boolean),
            0x18 => Ok(DataType::Bitmap8),
            0x19 => Ok(DataType::Bitmap16),
            0x20 => Ok(DataType::Uint8),
            0x21 => Ok(DataType::Uint16),
            0x22 => Ok(DataType::Uint24),
            0x23 => Ok(DataType::Uint32),
            0x25 => Ok(DataType::Uint48),
            0x27 => Ok(DataType::Uint64),
            0x28 => Ok(DataType::Int8),
            0x29 => Ok(DataType::Int16),
            0x2B => Ok(DataType::Int32),
            0x30 => Ok(DataType::Enum8),
            0x31 => Ok(DataType::Enum16),
            0x42 => Ok(DataType::CharString),
            _ => Err(value),
        }
    }
}

impl DataType {
    /// Wire width in bytes, `None` for length-prefixed types
    #[must_use]
    pub fn width(self) -> Option<usize> {
        match self {
            DataType::NoData => Some(0),
            DataType::Boolean
            | DataType::Bitmap8
            | DataType::Uint8
            | DataType::Int8
            | DataType::Enum8 => Some(1),
            DataType::Bitmap16 | DataType::Uint16 | DataType::Int16 | DataType::Enum16 => Some(2),
            DataType::Uint24 => Some(3),
            DataType::Uint32 | DataType::Int32 => Some(4),
            DataType::Uint48 => Some(6),
            DataType::Uint64 => Some(8),
            DataType::CharString => None,
        }
    }

    /// Analog types carry a reportable change in reporting configuration
    #[must_use]
    pub fn is_analog(self) -> bool {
        matches!(
            self,
            DataType::Uint8
                | DataType::Uint16
                | DataType::Uint24
                | DataType::Uint32
                | DataType::Uint48
                | DataType::Uint64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
        )
    }

    fn is_signed(self) -> bool {
        matches!(self, DataType::Int8 | DataType::Int16 | DataType::Int32)
    }
}

/// A typed ZCL attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Boolean(bool),
    Bitmap8(u8),
    Bitmap16(u16),
    Uint8(u8),
    Uint16(u16),
    Uint24(u32),
    Uint32(u32),
    Uint48(u64),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Enum8(u8),
    Enum16(u16),
    CharString(String),
}

/// Largest value representable in 48 bits
const UINT48_MAX: u64 = (1 << 48) - 1;

impl AttributeValue {
    /// The ZCL data type this value is encoded as
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            AttributeValue::Boolean(_) => DataType::Boolean,
            AttributeValue::Bitmap8(_) => DataType::Bitmap8,
            AttributeValue::Bitmap16(_) => DataType::Bitmap16,
            AttributeValue::Uint8(_) => DataType::Uint8,
            AttributeValue::Uint16(_) => DataType::Uint16,
            AttributeValue::Uint24(_) => DataType::Uint24,
            AttributeValue::Uint32(_) => DataType::Uint32,
            AttributeValue::Uint48(_) => DataType::Uint48,
            AttributeValue::Uint64(_) => DataType::Uint64,
            AttributeValue::Int8(_) => DataType::Int8,
            AttributeValue::Int16(_) => DataType::Int16,
            AttributeValue::Int32(_) => DataType::Int32,
            AttributeValue::Enum8(_) => DataType::Enum8,
            AttributeValue::Enum16(_) => DataType::Enum16,
            AttributeValue::CharString(_) => DataType::CharString,
        }
    }

    /// Build a value of the given integer-like type, rejecting values that do not fit
    #[allow(clippy::missing_errors_doc)]
    pub fn from_integer(data_type: DataType, value: i64) -> Result<Self, ProtocolError> {
        let out_of_range = || ProtocolError::ValueOutOfRange { data_type, value };

        if data_type.is_signed() {
            return match data_type {
                DataType::Int8 => i8::try_from(value).map(AttributeValue::Int8),
                DataType::Int16 => i16::try_from(value).map(AttributeValue::Int16),
                _ => i32::try_from(value).map(AttributeValue::Int32),
            }
            .map_err(|_| out_of_range());
        }

        let unsigned = u64::try_from(value).map_err(|_| out_of_range())?;
        let narrow = |max: u64| {
            if unsigned <= max {
                Ok(unsigned)
            } else {
                Err(out_of_range())
            }
        };

        // Narrowing casts below are guarded by `narrow`
        #[allow(clippy::cast_possible_truncation)]
        let value = match data_type {
            DataType::Boolean => AttributeValue::Boolean(narrow(1)? == 1),
            DataType::Bitmap8 => AttributeValue::Bitmap8(narrow(u8::MAX.into())? as u8),
            DataType::Bitmap16 => AttributeValue::Bitmap16(narrow(u16::MAX.into())? as u16),
            DataType::Uint8 => AttributeValue::Uint8(narrow(u8::MAX.into())? as u8),
            DataType::Uint16 => AttributeValue::Uint16(narrow(u16::MAX.into())? as u16),
            DataType::Uint24 => AttributeValue::Uint24(narrow(0x00FF_FFFF)? as u32),
            DataType::Uint32 => AttributeValue::Uint32(narrow(u32::MAX.into())? as u32),
            DataType::Uint48 => AttributeValue::Uint48(narrow(UINT48_MAX)?),
            DataType::Uint64 => AttributeValue::Uint64(unsigned),
            DataType::Enum8 => AttributeValue::Enum8(narrow(u8::MAX.into())? as u8),
            DataType::Enum16 => AttributeValue::Enum16(narrow(u16::MAX.into())? as u16),
            other => return Err(ProtocolError::UnsupportedDataType(other as u8)),
        };
        Ok(value)
    }

    /// Integer view of the value, if it has one that fits in `u64`
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            AttributeValue::Boolean(b) => Some(u64::from(b)),
            AttributeValue::Bitmap8(v) | AttributeValue::Uint8(v) | AttributeValue::Enum8(v) => {
                Some(v.into())
            }
            AttributeValue::Bitmap16(v)
            | AttributeValue::Uint16(v)
            | AttributeValue::Enum16(v) => Some(v.into()),
            AttributeValue::Uint24(v) | AttributeValue::Uint32(v) => Some(v.into()),
            AttributeValue::Uint48(v) | AttributeValue::Uint64(v) => Some(v),
            AttributeValue::Int8(v) => u64::try_from(v).ok(),
            AttributeValue::Int16(v) => u64::try_from(v).ok(),
            AttributeValue::Int32(v) => u64::try_from(v).ok(),
            AttributeValue::CharString(_) => None,
        }
    }

    /// Signed integer view of the value
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AttributeValue::Int8(v) => Some(v.into()),
            AttributeValue::Int16(v) => Some(v.into()),
            AttributeValue::Int32(v) => Some(v.into()),
            _ => self.as_u64().and_then(|v| i64::try_from(v).ok()),
        }
    }

    /// Split a 48/64-bit accumulator into (high, low) 32-bit words
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn split_words(&self) -> Option<(u32, u32)> {
        match *self {
            AttributeValue::Uint48(v) | AttributeValue::Uint64(v) => {
                Some(((v >> 32) as u32, v as u32))
            }
            _ => None,
        }
    }

    /// Append the little-endian wire encoding of the value (without type id)
    #[allow(clippy::missing_errors_doc)]
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        match self {
            AttributeValue::CharString(s) => {
                let len = u8::try_from(s.len())
                    .ok()
                    .filter(|len| *len != u8::MAX)
                    .ok_or_else(|| {
                        ProtocolError::InvalidFrame(format!("String too long: {} bytes", s.len()))
                    })?;
                out.push(len);
                out.extend_from_slice(s.as_bytes());
            }
            AttributeValue::Int8(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeValue::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            other => {
                let width = other.data_type().width().unwrap_or(0);
                let raw = other.as_u64().unwrap_or(0);
                write_uint(out, raw, width);
            }
        }
        Ok(())
    }

    /// Decode a value of `data_type` from the start of `data`
    ///
    /// Returns the value and the number of bytes consumed.
    #[allow(clippy::missing_errors_doc)]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn decode(data_type: DataType, data: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let Some(width) = data_type.width() else {
            // Character string: length-prefixed
            let len = *data.first().ok_or(ProtocolError::FrameTooShort(data.len()))? as usize;
            if len == 0xFF {
                // Invalid/unset string
                return Ok((AttributeValue::CharString(String::new()), 1));
            }
            if data.len() < 1 + len {
                return Err(ProtocolError::FrameTooShort(data.len()));
            }
            let text = String::from_utf8_lossy(&data[1..=len]).into_owned();
            return Ok((AttributeValue::CharString(text), 1 + len));
        };

        let raw = read_uint(data, width)?;
        let value = match data_type {
            DataType::NoData => {
                return Err(ProtocolError::UnsupportedDataType(DataType::NoData as u8))
            }
            DataType::Boolean => AttributeValue::Boolean(raw != 0),
            DataType::Bitmap8 => AttributeValue::Bitmap8(raw as u8),
            DataType::Bitmap16 => AttributeValue::Bitmap16(raw as u16),
            DataType::Uint8 => AttributeValue::Uint8(raw as u8),
            DataType::Uint16 => AttributeValue::Uint16(raw as u16),
            DataType::Uint24 => AttributeValue::Uint24(raw as u32),
            DataType::Uint32 => AttributeValue::Uint32(raw as u32),
            DataType::Uint48 => AttributeValue::Uint48(raw),
            DataType::Uint64 => AttributeValue::Uint64(raw),
            DataType::Int8 => AttributeValue::Int8(raw as u8 as i8),
            DataType::Int16 => AttributeValue::Int16(raw as u16 as i16),
            DataType::Int32 => AttributeValue::Int32(raw as u32 as i32),
            DataType::Enum8 => AttributeValue::Enum8(raw as u8),
            DataType::Enum16 => AttributeValue::Enum16(raw as u16),
            DataType::CharString => unreachable!("length-prefixed types handled above"),
        };
        Ok((value, width))
    }
}

/// Append the low `width` bytes of `value`, little-endian
pub(crate) fn write_uint(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

/// Read a little-endian unsigned integer of `width` bytes
pub(crate) fn read_uint(data: &[u8], width: usize) -> Result<u64, ProtocolError> {
    if data.len() < width {
        return Err(ProtocolError::FrameTooShort(data.len()));
    }
    let mut bytes = [0u8; 8];
    bytes[..width].copy_from_slice(&data[..width]);
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_from_u8() {
        assert_eq!(DataType::try_from(0x25), Ok(DataType::Uint48));
        assert_eq!(DataType::try_from(0xF0), Err(0xF0));
    }

    #[test]
    fn test_from_integer_range_checks() {
        assert_eq!(
            AttributeValue::from_integer(DataType::Uint8, 255),
            Ok(AttributeValue::Uint8(255))
        );
        assert!(matches!(
            AttributeValue::from_integer(DataType::Uint8, 256),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            AttributeValue::from_integer(DataType::Uint16, -1),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert_eq!(
            AttributeValue::from_integer(DataType::Int16, -300),
            Ok(AttributeValue::Int16(-300))
        );
    }

    #[test]
    fn test_uint48_encoding() {
        let value = AttributeValue::Uint48(0x0000_0102_0304_0506);
        let mut out = Vec::new();
        value.encode(&mut out).unwrap();
        assert_eq!(out, vec![0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);

        let (decoded, used) = AttributeValue::decode(DataType::Uint48, &out).unwrap();
        assert_eq!(used, 6);
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_split_words() {
        let value = AttributeValue::Uint48((7u64 << 32) + 1500);
        assert_eq!(value.split_words(), Some((7, 1500)));
        assert_eq!(AttributeValue::Uint16(3).split_words(), None);
    }

    #[test]
    fn test_decode_signed() {
        let (value, _) = AttributeValue::decode(DataType::Int8, &[0xFE]).unwrap();
        assert_eq!(value, AttributeValue::Int8(-2));
        assert_eq!(value.as_i64(), Some(-2));
        assert_eq!(value.as_u64(), None);
    }

    #[test]
    fn test_decode_string() {
        let data = [0x03, b'D', b'I', b'Y', 0xAA];
        let (value, used) = AttributeValue::decode(DataType::CharString, &data).unwrap();
        assert_eq!(used, 4);
        assert_eq!(value, AttributeValue::CharString("DIY".to_string()));
    }

    #[test]
    fn test_decode_too_short() {
        let result = AttributeValue::decode(DataType::Uint32, &[0x01, 0x02]);
        assert!(matches!(result, Err(ProtocolError::FrameTooShort(2))));
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_value(AttributeValue::Uint8(1)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "uint8", "value": 1}));
    }
}
