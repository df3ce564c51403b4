use crate::coerce::DataKind;
use crate::fields::{trim_description, TableLayout};
use crate::names::ControlName;
use crate::Result;

/// Record types the bridge creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    AnalogIn,
    AnalogOut,
    BoolIn,
    BoolOut,
    MbbIn,
    MbbOut,
    LongIn,
    LongOut,
    StringIn,
    StringOut,
    LongStringIn,
    LongStringOut,
    WaveformOut,
    Action,
}

impl RecordKind {
    /// Output records are written from the control side and pushed to the device.
    pub const fn is_output(self) -> bool {
        matches!(
            self,
            RecordKind::AnalogOut
                | RecordKind::BoolOut
                | RecordKind::MbbOut
                | RecordKind::LongOut
                | RecordKind::StringOut
                | RecordKind::LongStringOut
                | RecordKind::WaveformOut
                | RecordKind::Action
        )
    }

    /// EPICS record type name.
    pub const fn record_type(self) -> &'static str {
        match self {
            RecordKind::AnalogIn => "ai",
            RecordKind::AnalogOut => "ao",
            RecordKind::BoolIn => "bi",
            RecordKind::BoolOut => "bo",
            RecordKind::MbbIn => "mbbi",
            RecordKind::MbbOut => "mbbo",
            RecordKind::LongIn => "longin",
            RecordKind::LongOut => "longout",
            RecordKind::StringIn => "stringin",
            RecordKind::StringOut => "stringout",
            RecordKind::LongStringIn => "lsi",
            RecordKind::LongStringOut => "lso",
            RecordKind::WaveformOut => "waveform",
            RecordKind::Action => "bo",
        }
    }

    pub fn for_data_kind(kind: &DataKind, output: bool) -> Self {
        match (kind, output) {
            (DataKind::Analog, false) => RecordKind::AnalogIn,
            (DataKind::Analog, true) => RecordKind::AnalogOut,
            (DataKind::Long, false) => RecordKind::LongIn,
            (DataKind::Long, true) => RecordKind::LongOut,
            (DataKind::Bool, false) => RecordKind::BoolIn,
            (DataKind::Bool, true) => RecordKind::BoolOut,
            (DataKind::MultiState(_), false) => RecordKind::MbbIn,
            (DataKind::MultiState(_), true) => RecordKind::MbbOut,
            (DataKind::Text, false) => RecordKind::StringIn,
            (DataKind::Text, true) => RecordKind::StringOut,
            (DataKind::LongText, false) => RecordKind::LongStringIn,
            (DataKind::LongText, true) => RecordKind::LongStringOut,
            (DataKind::Action, _) => RecordKind::Action,
        }
    }
}

/// Everything the record layer needs to create one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub name: ControlName,
    pub kind: RecordKind,
    pub labels: Option<Vec<String>>,
    pub description: Option<String>,
    /// Element count for waveforms
    pub length: Option<usize>,
}

/// The external layer that turns [`RecordSpec`]s into live records.
pub trait RecordRegistrar {
    type Handle;

    fn register(&mut self, spec: &RecordSpec) -> Result<Self::Handle>;
}

pub fn plan_scalar_record(
    name: ControlName,
    kind: &DataKind,
    output: bool,
    description: Option<&str>,
) -> RecordSpec {
    let description = trim_description(description, name.as_str());
    RecordSpec {
        kind: RecordKind::for_data_kind(kind, output),
        labels: kind.labels().map(<[String]>::to_vec),
        description,
        length: None,
        name,
    }
}

/// One waveform per column of the table at `table_name`.
///
/// The layout has already been validated, so planning cannot fail half way; a failure
/// building the names fails the whole table.
pub fn plan_table_records(
    table_name: &ControlName,
    layout: &TableLayout,
) -> Result<Vec<RecordSpec>> {
    let length = layout.max_length();
    layout
        .fields()
        .iter()
        .map(|f| -> Result<RecordSpec> {
            let name = table_name.join(&f.name)?;
            let description = f.display_description(name.as_str());
            Ok(RecordSpec {
                kind: RecordKind::WaveformOut,
                labels: f.labels.clone(),
                description,
                length,
                name,
            })
        })
        .collect()
}

/// Register every spec, in order, returning the handles.
pub fn register_all<R: RecordRegistrar>(
    registrar: &mut R,
    specs: &[RecordSpec],
) -> Result<Vec<R::Handle>> {
    specs.iter().map(|s| registrar.register(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldSubtype, TableField};

    #[test]
    fn test_output_kinds() {
        assert!(RecordKind::AnalogOut.is_output());
        assert!(RecordKind::Action.is_output());
        assert!(RecordKind::WaveformOut.is_output());
        assert!(!RecordKind::MbbIn.is_output());
        assert!(!RecordKind::LongStringIn.is_output());
        assert_eq!(RecordKind::LongStringOut.record_type(), "lso");
    }

    #[test]
    fn test_scalar_plan() {
        let kind = DataKind::multi_state(["Rising", "Falling", "Either"], "PCAP:TRIG_EDGE")
            .unwrap();
        let spec = plan_scalar_record(
            ControlName::new("PCAP:TRIG_EDGE").unwrap(),
            &kind,
            true,
            Some("Trig Edge Desc"),
        );
        assert_eq!(spec.kind, RecordKind::MbbOut);
        assert_eq!(spec.labels.as_ref().map(Vec::len), Some(3));
        assert_eq!(spec.description.as_deref(), Some("Trig Edge Desc"));

        let label = plan_scalar_record(
            ControlName::new("PCAP:LABEL").unwrap(),
            &DataKind::LongText,
            true,
            None,
        );
        assert_eq!(label.kind, RecordKind::LongStringOut);
        assert_eq!(label.kind.record_type(), "lso");
        assert_eq!(
            RecordKind::for_data_kind(&DataKind::LongText, false),
            RecordKind::LongStringIn
        );
    }

    #[test]
    fn test_table_plan() {
        let layout = TableLayout::new(
            vec![
                TableField::new("REPEATS", 0, 15, FieldSubtype::Uint)
                    .with_description("Number of times the line will repeat"),
                TableField::new("TRIGGER", 16, 19, FieldSubtype::Enum)
                    .with_labels(["Immediate", "BITA=0"])
                    .with_description("The trigger condition to start the phases"),
            ],
            32,
        )
        .unwrap()
        .with_max_length(16384);
        let specs = plan_table_records(&ControlName::new("SEQ1:TABLE").unwrap(), &layout).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name.as_str(), "SEQ1:TABLE:REPEATS");
        assert_eq!(specs[1].labels.as_ref().map(Vec::len), Some(2));
        assert_eq!(specs[1].length, Some(16384));
        assert_eq!(
            specs[1].description.as_deref(),
            Some("The trigger condition to start the phas")
        );
    }
}
