use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Most labels an mbbi/mbbo record can hold
pub const MAX_LABELS: usize = 16;
/// EPICS string fields hold 40 bytes including the terminator
pub const DESCRIPTION_LIMIT: usize = 39;
pub const DEFAULT_WORD_WIDTH: u32 = 32;
/// Widest field the codec can hold in one value
pub const MAX_FIELD_WIDTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSubtype {
    Uint,
    Int,
    Enum,
}

impl FromStr for FieldSubtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uint" => Ok(FieldSubtype::Uint),
            "int" => Ok(FieldSubtype::Int),
            "enum" => Ok(FieldSubtype::Enum),
            other => Err(Error::Format(format!("unknown table field subtype: {other:?}"))),
        }
    }
}

/// One column of a table: where its bits live in a row and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    pub name: String,
    pub bit_low: u32,
    pub bit_high: u32,
    pub subtype: FieldSubtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TableField {
    pub fn new(
        name: impl Into<String>,
        bit_low: u32,
        bit_high: u32,
        subtype: FieldSubtype,
    ) -> Self {
        Self {
            name: name.into(),
            bit_low,
            bit_high,
            subtype,
            labels: None,
            description: None,
        }
    }

    pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.bit_high - self.bit_low + 1
    }

    pub fn labels(&self) -> &[String] {
        self.labels.as_deref().unwrap_or(&[])
    }

    /// Description cut down to what fits in a record's DESC field.
    pub fn display_description(&self, record_name: &str) -> Option<String> {
        trim_description(self.description.as_deref(), record_name)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Configuration("table field with empty name".into()));
        }
        if self.bit_low > self.bit_high {
            return Err(Error::Configuration(format!(
                "field {}: bit_low {} above bit_high {}",
                self.name, self.bit_low, self.bit_high
            )));
        }
        // compare the span before adding one so that `width()` cannot overflow
        if self.bit_high - self.bit_low >= MAX_FIELD_WIDTH {
            return Err(Error::Configuration(format!(
                "field {}: bits {}..={} wider than the {MAX_FIELD_WIDTH} supported",
                self.name, self.bit_low, self.bit_high
            )));
        }
        match (self.subtype, &self.labels) {
            (FieldSubtype::Enum, None) => Err(Error::Configuration(format!(
                "enum field {} has no labels",
                self.name
            ))),
            (FieldSubtype::Enum, Some(labels)) => {
                if labels.is_empty() {
                    return Err(Error::Configuration(format!(
                        "enum field {} has an empty label list",
                        self.name
                    )));
                }
                check_num_labels(labels, &self.name)?;
                let codes = 1u128 << self.width();
                if labels.len() as u128 > codes {
                    return Err(Error::Configuration(format!(
                        "enum field {}: {} labels do not fit in {} bits",
                        self.name,
                        labels.len(),
                        self.width()
                    )));
                }
                Ok(())
            }
            (_, Some(_)) => Err(Error::Configuration(format!(
                "labels given for non-enum field {}",
                self.name
            ))),
            (_, None) => Ok(()),
        }
    }
}

/// Check that the number of labels fits into an mbbi/mbbo record.
pub fn check_num_labels(labels: &[String], record_name: &str) -> Result<()> {
    if labels.len() > MAX_LABELS {
        return Err(Error::Configuration(format!(
            "too many labels ({}) to create record {record_name}",
            labels.len()
        )));
    }
    Ok(())
}

/// Cut a description to [`DESCRIPTION_LIMIT`] characters.
///
/// Long descriptions are common and nothing can be done about them, so the cut is only
/// logged at info level.
pub fn trim_description(description: Option<&str>, record_name: &str) -> Option<String> {
    let description = description?;
    if description.chars().count() > DESCRIPTION_LIMIT {
        tracing::info!(
            record = record_name,
            description,
            "description longer than EPICS limit of 40 characters, truncating"
        );
        return Some(description.chars().take(DESCRIPTION_LIMIT).collect());
    }
    Some(description.to_string())
}

/// Validated field set of one table plus the packing parameters.
///
/// All checks (overlaps, label counts, widths) run once here so that packing and
/// unpacking never have to repeat them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    fields: Vec<TableField>,
    word_width: u32,
    words_per_row: usize,
    max_length: Option<usize>,
    description: Option<String>,
}

impl TableLayout {
    pub fn new(fields: Vec<TableField>, word_width: u32) -> Result<Self> {
        if !(1..=32).contains(&word_width) {
            return Err(Error::Configuration(format!(
                "word width {word_width} outside 1..=32"
            )));
        }
        if fields.is_empty() {
            return Err(Error::Configuration("table has no fields".into()));
        }

        let mut names = HashSet::new();
        for f in &fields {
            f.validate()?;
            if !names.insert(f.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "duplicate field name {}",
                    f.name
                )));
            }
        }

        let mut ranges: Vec<&TableField> = fields.iter().collect();
        ranges.sort_by_key(|f| f.bit_low);
        for pair in ranges.windows(2) {
            if pair[1].bit_low <= pair[0].bit_high {
                return Err(Error::Configuration(format!(
                    "fields {} [{}..{}] and {} [{}..{}] overlap",
                    pair[0].name,
                    pair[0].bit_low,
                    pair[0].bit_high,
                    pair[1].name,
                    pair[1].bit_low,
                    pair[1].bit_high
                )));
            }
        }

        let row_bits = fields.iter().map(|f| f.bit_high).max().unwrap_or(0) as usize + 1;
        let words_per_row = row_bits.div_ceil(word_width as usize);

        Ok(Self {
            fields,
            word_width,
            words_per_row,
            max_length: None,
            description: None,
        })
    }

    /// Use a row size declared by the device instead of the minimum the fields need.
    pub fn with_words_per_row(mut self, words_per_row: usize) -> Result<Self> {
        if words_per_row < self.words_per_row {
            return Err(Error::Configuration(format!(
                "{words_per_row} words per row cannot hold {} bits",
                self.row_bits()
            )));
        }
        self.words_per_row = words_per_row;
        Ok(self)
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[TableField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&TableField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn word_width(&self) -> u32 {
        self.word_width
    }

    pub fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Bits used by the highest field.
    pub fn row_bits(&self) -> usize {
        self.fields.iter().map(|f| f.bit_high).max().unwrap_or(0) as usize + 1
    }
}

/// Serialized form of a table layout, as found in YAML layout files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default = "default_word_width")]
    pub word_width: u32,
    #[serde(default)]
    pub words_per_row: Option<usize>,
    pub fields: Vec<TableField>,
}

fn default_word_width() -> u32 {
    DEFAULT_WORD_WIDTH
}

impl TableInfo {
    pub fn into_layout(self) -> Result<TableLayout> {
        let mut layout = TableLayout::new(self.fields, self.word_width)?;
        if let Some(n) = self.words_per_row {
            layout = layout.with_words_per_row(n)?;
        }
        if let Some(n) = self.max_length {
            layout = layout.with_max_length(n);
        }
        if let Some(d) = self.description {
            layout = layout.with_description(d);
        }
        Ok(layout)
    }
}
