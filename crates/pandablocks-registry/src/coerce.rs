use crate::fields::check_num_labels;
use crate::{Error, Result};
use pandablocks_wire::WireValue;

/// Zero state name of bi/bo records
pub const ZNAM_STR: &str = "0";
/// One state name of bi/bo records
pub const ONAM_STR: &str = "1";
/// EPICS string records hold 40 bytes including the terminator
pub const STRING_LIMIT: usize = 39;

/// How a scalar field's wire text maps onto a record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataKind {
    Analog,
    Long,
    Bool,
    MultiState(Vec<String>),
    Text,
    /// Text kept whole, for long string records
    LongText,
    Action,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    /// Index into the record's labels
    State(usize),
    Text(String),
    Void,
}

/// A decoded field: a value, or the device's "in error" marker.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(ScalarValue),
    InError,
}

impl FieldValue {
    pub fn is_in_error(&self) -> bool {
        matches!(self, FieldValue::InError)
    }

    /// The value, or [`Error::DeviceProtocol`] if the device marked the field in error.
    pub fn require_value(self, field: &str) -> Result<ScalarValue> {
        match self {
            FieldValue::Value(v) => Ok(v),
            FieldValue::InError => Err(Error::DeviceProtocol {
                field: field.to_string(),
            }),
        }
    }
}

impl DataKind {
    /// A multi-state kind. Fails straight away if the labels cannot fit an mbbi/mbbo.
    pub fn multi_state<S: Into<String>>(
        labels: impl IntoIterator<Item = S>,
        record_name: &str,
    ) -> Result<Self> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        check_num_labels(&labels, record_name)?;
        Ok(DataKind::MultiState(labels))
    }

    pub fn labels(&self) -> Option<&[String]> {
        match self {
            DataKind::MultiState(labels) => Some(labels),
            _ => None,
        }
    }

    pub fn decode(&self, wire: &WireValue, field: &str) -> Result<FieldValue> {
        match wire {
            WireValue::InError => Ok(FieldValue::InError),
            WireValue::Text(text) => self.decode_text(text, field).map(FieldValue::Value),
        }
    }

    pub fn decode_text(&self, text: &str, field: &str) -> Result<ScalarValue> {
        let bad = |what: &str| Error::Format(format!("{field}: cannot decode {text:?} as {what}"));
        match self {
            DataKind::Analog => text
                .trim()
                .parse::<f64>()
                .map(ScalarValue::Float)
                .map_err(|_| bad("a number")),
            DataKind::Long => {
                let v = text.trim().parse::<i64>().map_err(|_| bad("an integer"))?;
                check_long(v, field).map(ScalarValue::Int)
            }
            DataKind::Bool => match text {
                ZNAM_STR => Ok(ScalarValue::Bool(false)),
                ONAM_STR => Ok(ScalarValue::Bool(true)),
                _ => Err(bad("a boolean")),
            },
            DataKind::MultiState(labels) => labels
                .iter()
                .position(|l| l == text)
                .map(ScalarValue::State)
                .ok_or_else(|| bad("one of the field's labels")),
            DataKind::Text | DataKind::LongText => Ok(ScalarValue::Text(text.to_string())),
            DataKind::Action => Ok(ScalarValue::Void),
        }
    }

    /// Render a value as the text to send to the device.
    pub fn encode(&self, value: &ScalarValue, field: &str) -> Result<String> {
        match (self, value) {
            (DataKind::Analog, ScalarValue::Float(v)) => Ok(v.to_string()),
            (DataKind::Analog, ScalarValue::Int(v)) => Ok(v.to_string()),
            (DataKind::Long, ScalarValue::Int(v)) => check_long(*v, field).map(|v| v.to_string()),
            (DataKind::Bool, ScalarValue::Bool(b)) => {
                Ok(if *b { ONAM_STR } else { ZNAM_STR }.to_string())
            }
            (DataKind::MultiState(labels), ScalarValue::State(i)) => {
                labels.get(*i).cloned().ok_or_else(|| {
                    Error::Range(format!(
                        "{field}: state {i} outside {} labels",
                        labels.len()
                    ))
                })
            }
            (DataKind::Text, ScalarValue::Text(s)) => Ok(trim_string_value(s, field)),
            (DataKind::LongText, ScalarValue::Text(s)) => Ok(s.clone()),
            (DataKind::Action, _) => Ok(String::new()),
            (kind, value) => Err(Error::Format(format!(
                "{field}: cannot encode {value:?} as {kind:?}"
            ))),
        }
    }
}

/// longin/longout records hold 32-bit values.
fn check_long(v: i64, field: &str) -> Result<i64> {
    if i32::try_from(v).is_err() {
        return Err(Error::Range(format!(
            "{field}: {v} outside the 32-bit range of long records"
        )));
    }
    Ok(v)
}

/// Cut a string value to [`STRING_LIMIT`] characters.
///
/// The device would reject the longer value outright, so the cut is logged as an error
/// even though the write goes ahead.
pub fn trim_string_value(value: &str, record_name: &str) -> String {
    if value.chars().count() > STRING_LIMIT {
        tracing::error!(
            record = record_name,
            value,
            "value longer than EPICS limit of 40 characters, truncating"
        );
        return value.chars().take(STRING_LIMIT).collect();
    }
    value.to_string()
}
