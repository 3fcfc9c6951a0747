//! Raw, normalized and command values

use crate::error::ConverterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zcl_codec::AttributeValue;

/// Symbolic command tokens and the integers they stand for
const SYMBOLIC_VALUES: &[(&str, i64)] = &[("OFF", 0), ("ON", 1)];

/// A raw attribute value as delivered by the transport
///
/// Metering accumulators arrive as two 32-bit words `[high, low]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Words(u32, u32),
    Integer(i64),
    Bool(bool),
    Text(String),
}

impl RawValue {
    /// Reassemble a 64-bit accumulator: `(high << 32) + low`
    #[must_use]
    pub fn accumulator(&self) -> Option<u64> {
        match *self {
            RawValue::Words(high, low) => Some((u64::from(high) << 32) + u64::from(low)),
            RawValue::Integer(n) => u64::try_from(n).ok(),
            RawValue::Bool(b) => Some(u64::from(b)),
            RawValue::Text(_) => None,
        }
    }

    /// Plain integer view
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            RawValue::Integer(n) => Some(n),
            RawValue::Bool(b) => Some(i64::from(b)),
            RawValue::Words(..) => self.accumulator().and_then(|v| i64::try_from(v).ok()),
            RawValue::Text(_) => None,
        }
    }
}

impl From<&AttributeValue> for RawValue {
    fn from(value: &AttributeValue) -> Self {
        if let Some((high, low)) = value.split_words() {
            return RawValue::Words(high, low);
        }
        match value {
            AttributeValue::Boolean(b) => RawValue::Bool(*b),
            AttributeValue::CharString(s) => RawValue::Text(s.clone()),
            other => other
                .as_i64()
                .map_or_else(|| RawValue::Text(format!("{other:?}")), RawValue::Integer),
        }
    }
}

/// A normalized state value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl StateValue {
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            StateValue::Unsigned(v) => Some(v),
            StateValue::Signed(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        u64::try_from(value).map_or(StateValue::Signed(value), StateValue::Unsigned)
    }
}

/// Externally visible key to value, ready for publication
pub type StateUpdate = BTreeMap<String, StateValue>;

/// A value supplied to a set command, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    /// A token from the symbolic lookup (`ON`, `OFF`)
    Symbolic(String),
    /// Anything else, parsed as a base-10 integer on normalization
    Numeric(String),
}

impl CommandValue {
    /// Classify a textual command value
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim();
        if lookup_symbol(token).is_some() {
            CommandValue::Symbolic(token.to_string())
        } else {
            CommandValue::Numeric(raw.to_string())
        }
    }

    /// Classify a JSON command value
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Bool(true) => CommandValue::Symbolic("ON".to_string()),
            serde_json::Value::Bool(false) => CommandValue::Symbolic("OFF".to_string()),
            other => CommandValue::Numeric(other.to_string()),
        }
    }

    /// The value as supplied
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            CommandValue::Symbolic(s) | CommandValue::Numeric(s) => s,
        }
    }

    /// Resolve to an integer for the wire
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::InvalidValue`] when the value is neither a
    /// symbolic token nor a base-10 integer.
    pub fn normalize(&self, field: &str) -> Result<i64, ConverterError> {
        let invalid = || ConverterError::InvalidValue {
            field: field.to_string(),
            value: self.raw().to_string(),
        };
        match self {
            CommandValue::Symbolic(token) => lookup_symbol(token).ok_or_else(invalid),
            CommandValue::Numeric(text) => text.trim().parse::<i64>().map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

fn lookup_symbol(token: &str) -> Option<i64> {
    SYMBOLIC_VALUES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_words() {
        assert_eq!(RawValue::Words(0, 1500).accumulator(), Some(1500));
        assert_eq!(RawValue::Words(1, 0).accumulator(), Some(1 << 32));
        assert_eq!(
            RawValue::Words(u32::MAX, u32::MAX).accumulator(),
            Some(u64::MAX)
        );
        assert_eq!(RawValue::Integer(-1).accumulator(), None);
    }

    #[test]
    fn test_raw_value_from_attribute() {
        assert_eq!(
            RawValue::from(&AttributeValue::Uint48(0x0001_0000_0005)),
            RawValue::Words(1, 5)
        );
        assert_eq!(RawValue::from(&AttributeValue::Uint8(7)), RawValue::Integer(7));
        assert_eq!(RawValue::from(&AttributeValue::Boolean(true)), RawValue::Bool(true));
    }

    #[test]
    fn test_raw_value_json() {
        let words: RawValue = serde_json::from_str("[0, 1500]").unwrap();
        assert_eq!(words, RawValue::Words(0, 1500));
        let int: RawValue = serde_json::from_str("42").unwrap();
        assert_eq!(int, RawValue::Integer(42));
    }

    #[test]
    fn test_symbolic_and_numeric_agree() {
        let on = CommandValue::parse("ON");
        assert!(matches!(on, CommandValue::Symbolic(_)));
        assert_eq!(on.normalize("f").unwrap(), 1);
        assert_eq!(CommandValue::parse("1").normalize("f").unwrap(), 1);
        assert_eq!(CommandValue::parse("OFF").normalize("f").unwrap(), 0);
        assert_eq!(CommandValue::parse("0").normalize("f").unwrap(), 0);
    }

    #[test]
    fn test_invalid_value() {
        let err = CommandValue::parse("abc").normalize("step_water_preset");
        assert!(matches!(err, Err(ConverterError::InvalidValue { .. })));
        assert!(CommandValue::parse("1.5").normalize("f").is_err());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            CommandValue::from_json(&serde_json::json!(75)).normalize("f").unwrap(),
            75
        );
        assert_eq!(
            CommandValue::from_json(&serde_json::json!(true)).normalize("f").unwrap(),
            1
        );
        assert!(CommandValue::from_json(&serde_json::json!(null)).normalize("f").is_err());
    }
}
