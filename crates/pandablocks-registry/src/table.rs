//! Packing and unpacking of PandA tables.
//!
//! On the wire a table is a flat run of words, `words_per_row` of them per row. Each
//! field occupies an inclusive bit range of the row, counted from bit 0 of the first
//! word, and may cross word boundaries. The unpacked form holds one typed column per
//! field, in declaration order.

use crate::fields::{FieldSubtype, TableField, TableLayout};
use crate::{Error, Result};

/// Element type of a column, chosen from the field's subtype and width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Labels,
}

impl ColumnType {
    pub fn for_field(field: &TableField) -> Self {
        let width = field.width();
        match field.subtype {
            FieldSubtype::Enum => ColumnType::Labels,
            FieldSubtype::Uint => match width {
                0..=8 => ColumnType::U8,
                9..=16 => ColumnType::U16,
                17..=32 => ColumnType::U32,
                _ => ColumnType::U64,
            },
            FieldSubtype::Int => match width {
                0..=8 => ColumnType::I8,
                9..=16 => ColumnType::I16,
                17..=32 => ColumnType::I32,
                _ => ColumnType::I64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Labels(Vec<String>),
}

macro_rules! column_from {
    ($($variant:ident => $ty:ty),*) => {$(
        impl From<Vec<$ty>> for Column {
            fn from(v: Vec<$ty>) -> Self {
                Column::$variant(v)
            }
        }
    )*};
}

column_from!(
    U8 => u8, U16 => u16, U32 => u32, U64 => u64,
    I8 => i8, I16 => i16, I32 => i32, I64 => i64,
    Labels => String
);

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Labels(v.into_iter().map(String::from).collect())
    }
}

impl Column {
    fn with_capacity(ty: ColumnType, n: usize) -> Self {
        match ty {
            ColumnType::U8 => Column::U8(Vec::with_capacity(n)),
            ColumnType::U16 => Column::U16(Vec::with_capacity(n)),
            ColumnType::U32 => Column::U32(Vec::with_capacity(n)),
            ColumnType::U64 => Column::U64(Vec::with_capacity(n)),
            ColumnType::I8 => Column::I8(Vec::with_capacity(n)),
            ColumnType::I16 => Column::I16(Vec::with_capacity(n)),
            ColumnType::I32 => Column::I32(Vec::with_capacity(n)),
            ColumnType::I64 => Column::I64(Vec::with_capacity(n)),
            ColumnType::Labels => Column::Labels(Vec::with_capacity(n)),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::U8(_) => ColumnType::U8,
            Column::U16(_) => ColumnType::U16,
            Column::U32(_) => ColumnType::U32,
            Column::U64(_) => ColumnType::U64,
            Column::I8(_) => ColumnType::I8,
            Column::I16(_) => ColumnType::I16,
            Column::I32(_) => ColumnType::I32,
            Column::I64(_) => ColumnType::I64,
            Column::Labels(_) => ColumnType::Labels,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::U8(v) => v.len(),
            Column::U16(v) => v.len(),
            Column::U32(v) => v.len(),
            Column::U64(v) => v.len(),
            Column::I8(v) => v.len(),
            Column::I16(v) => v.len(),
            Column::I32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse textual cells into the column type `field` decodes to.
    pub fn from_text<S: AsRef<str>>(field: &TableField, cells: &[S]) -> Result<Self> {
        let ty = ColumnType::for_field(field);
        let mut col = Column::with_capacity(ty, cells.len());
        for cell in cells {
            let cell = cell.as_ref().trim();
            let bad = || Error::Format(format!("field {}: cannot parse {cell:?}", field.name));
            match &mut col {
                Column::U8(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::U16(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::U32(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::U64(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::I8(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::I16(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::I32(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::I64(v) => v.push(cell.parse().map_err(|_| bad())?),
                Column::Labels(v) => v.push(cell.to_string()),
            }
        }
        Ok(col)
    }

    /// Cells rendered as text, the inverse of [`Column::from_text`].
    pub fn to_text(&self) -> Vec<String> {
        fn render<T: ToString>(v: &[T]) -> Vec<String> {
            v.iter().map(ToString::to_string).collect()
        }
        match self {
            Column::U8(v) => render(v),
            Column::U16(v) => render(v),
            Column::U32(v) => render(v),
            Column::U64(v) => render(v),
            Column::I8(v) => render(v),
            Column::I16(v) => render(v),
            Column::I32(v) => render(v),
            Column::I64(v) => render(v),
            Column::Labels(v) => v.clone(),
        }
    }

    /// Append a decoded cell. `raw` already holds the field's bits, right aligned.
    fn push_raw(&mut self, raw: u64, field: &TableField, row: usize) -> Result<()> {
        let width = field.width();
        match self {
            Column::U8(v) => v.push(raw as u8),
            Column::U16(v) => v.push(raw as u16),
            Column::U32(v) => v.push(raw as u32),
            Column::U64(v) => v.push(raw),
            Column::I8(v) => v.push(sign_extend(raw, width) as i8),
            Column::I16(v) => v.push(sign_extend(raw, width) as i16),
            Column::I32(v) => v.push(sign_extend(raw, width) as i32),
            Column::I64(v) => v.push(sign_extend(raw, width)),
            Column::Labels(v) => {
                let label = field.labels().get(raw as usize).ok_or_else(|| {
                    Error::Range(format!(
                        "field {} row {row}: code {raw} has no label ({} labels)",
                        field.name,
                        field.labels().len()
                    ))
                })?;
                v.push(label.clone());
            }
        }
        Ok(())
    }

    /// The bits to store for cell `row`, right aligned and range checked.
    fn raw_at(&self, row: usize, field: &TableField) -> Result<u64> {
        let width = field.width();
        let unsigned = |v: u64| -> Result<u64> {
            if v > mask(width) {
                return Err(Error::Range(format!(
                    "field {} row {row}: {v} does not fit in {width} bits",
                    field.name
                )));
            }
            Ok(v)
        };
        let signed = |v: i64| -> Result<u64> {
            let (min, max) = signed_bounds(width);
            if v < min || v > max {
                return Err(Error::Range(format!(
                    "field {} row {row}: {v} does not fit in {width} signed bits",
                    field.name
                )));
            }
            Ok(v as u64 & mask(width))
        };
        match self {
            Column::U8(v) => unsigned(u64::from(v[row])),
            Column::U16(v) => unsigned(u64::from(v[row])),
            Column::U32(v) => unsigned(u64::from(v[row])),
            Column::U64(v) => unsigned(v[row]),
            Column::I8(v) => signed(i64::from(v[row])),
            Column::I16(v) => signed(i64::from(v[row])),
            Column::I32(v) => signed(i64::from(v[row])),
            Column::I64(v) => signed(v[row]),
            Column::Labels(v) => {
                let label = &v[row];
                let code = field
                    .labels()
                    .iter()
                    .position(|l| l == label)
                    .ok_or_else(|| {
                        Error::Format(format!(
                            "field {} row {row}: unknown label {label:?}",
                            field.name
                        ))
                    })?;
                unsigned(code as u64)
            }
        }
    }
}

/// Unpacked table: one named column per field, all of the same length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTable {
    columns: Vec<(String, Column)>,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, replacing any previous column of the same name.
    pub fn insert(&mut self, name: impl Into<String>, column: impl Into<Column>) {
        let name = name.into();
        let column = column.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Rows in the first column; 0 for a table without columns.
    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }
}

/// Decode packed words into columns.
pub fn unpack_table(layout: &TableLayout, words: &[u32]) -> Result<ColumnTable> {
    let per_row = layout.words_per_row();
    if words.len() % per_row != 0 {
        return Err(Error::Format(format!(
            "{} words is not a whole number of {per_row}-word rows",
            words.len()
        )));
    }
    let rows = words.len() / per_row;
    check_row_count(layout, rows)?;
    let word_mask = mask(layout.word_width());
    if let Some((i, w)) = words
        .iter()
        .enumerate()
        .find(|(_, w)| u64::from(**w) > word_mask)
    {
        return Err(Error::Format(format!(
            "word {i} ({w}) wider than {} bits",
            layout.word_width()
        )));
    }

    let mut table = ColumnTable::new();
    for field in layout.fields() {
        let mut column = Column::with_capacity(ColumnType::for_field(field), rows);
        for (row, chunk) in words.chunks_exact(per_row).enumerate() {
            let raw = extract_bits(chunk, field.bit_low, field.bit_high, layout.word_width());
            column.push_raw(raw, field, row)?;
        }
        table.columns.push((field.name.clone(), column));
    }
    tracing::debug!(rows, fields = table.len(), "unpacked table");
    Ok(table)
}

/// Decode a single row, e.g. for diagnostics of a bad dump.
pub fn unpack_row(layout: &TableLayout, row: &[u32]) -> Result<ColumnTable> {
    if row.len() != layout.words_per_row() {
        return Err(Error::Format(format!(
            "row has {} words, expected {}",
            row.len(),
            layout.words_per_row()
        )));
    }
    unpack_table(layout, row)
}

/// Encode columns into packed words. The exact inverse of [`unpack_table`].
pub fn pack_table(layout: &TableLayout, table: &ColumnTable) -> Result<Vec<u32>> {
    if let Some(extra) = table.names().find(|n| layout.field(n).is_none()) {
        return Err(Error::Format(format!("column {extra} is not a table field")));
    }
    let mut columns = Vec::with_capacity(layout.fields().len());
    for field in layout.fields() {
        let column = table
            .get(&field.name)
            .ok_or_else(|| Error::Format(format!("missing column {}", field.name)))?;
        let expected = ColumnType::for_field(field);
        if column.column_type() != expected {
            return Err(Error::Format(format!(
                "column {} is {:?}, expected {expected:?}",
                field.name,
                column.column_type()
            )));
        }
        columns.push((field, column));
    }

    let rows = table.row_count();
    if let Some((field, column)) = columns.iter().find(|(_, c)| c.len() != rows) {
        return Err(Error::Format(format!(
            "column {} has {} rows, expected {rows}",
            field.name,
            column.len()
        )));
    }
    check_row_count(layout, rows)?;

    let per_row = layout.words_per_row();
    let mut words = vec![0u32; rows * per_row];
    for (field, column) in &columns {
        for (row, chunk) in words.chunks_exact_mut(per_row).enumerate() {
            let raw = column.raw_at(row, field)?;
            insert_bits(chunk, field.bit_low, field.bit_high, layout.word_width(), raw);
        }
    }
    tracing::debug!(rows, words = words.len(), "packed table");
    Ok(words)
}

fn check_row_count(layout: &TableLayout, rows: usize) -> Result<()> {
    match layout.max_length() {
        Some(max) if rows > max => Err(Error::Format(format!(
            "{rows} rows exceeds table maximum of {max}"
        ))),
        _ => Ok(()),
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn signed_bounds(width: u32) -> (i64, i64) {
    if width >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1)
    }
}

/// Interpret the low `width` bits of `raw` as two's complement.
fn sign_extend(raw: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

/// Gather bits `low..=high` of a row, least significant first, across as many words as
/// the range touches.
fn extract_bits(row: &[u32], low: u32, high: u32, word_width: u32) -> u64 {
    let mut value = 0u64;
    let mut filled = 0u32;
    let mut bit = low;
    while bit <= high {
        let index = (bit / word_width) as usize;
        let offset = bit % word_width;
        let take = (word_width - offset).min(high - bit + 1);
        let chunk = (u64::from(row[index]) >> offset) & mask(take);
        value |= chunk << filled;
        filled += take;
        bit += take;
    }
    value
}

/// Scatter the low bits of `value` into `low..=high` of a row. Mirror of
/// [`extract_bits`].
fn insert_bits(row: &mut [u32], low: u32, high: u32, word_width: u32, value: u64) {
    let mut consumed = 0u32;
    let mut bit = low;
    while bit <= high {
        let index = (bit / word_width) as usize;
        let offset = bit % word_width;
        let take = (word_width - offset).min(high - bit + 1);
        let chunk = (value >> consumed) & mask(take);
        row[index] |= (chunk << offset) as u32;
        consumed += take;
        bit += take;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldSubtype, TableField};
    use proptest::prelude::*;

    fn layout(fields: Vec<TableField>, word_width: u32) -> TableLayout {
        TableLayout::new(fields, word_width).unwrap()
    }

    #[test]
    fn test_extract_within_one_word() {
        let row = [0b0110u32 << 16];
        assert_eq!(extract_bits(&row, 16, 19, 32), 6);
        assert_eq!(extract_bits(&row, 0, 15, 32), 0);
    }

    #[test]
    fn test_field_spanning_two_words() {
        let l = layout(vec![TableField::new("X", 28, 35, FieldSubtype::Uint)], 32);
        assert_eq!(l.words_per_row(), 2);
        // low nibble 0xB in bits 28..31 of word 0, high nibble 0xA in bits 0..3 of word 1
        let words = [0xB000_0000u32, 0x0000_000A];
        let table = unpack_table(&l, &words).unwrap();
        assert_eq!(table.get("X"), Some(&Column::U8(vec![0xAB])));
        assert_eq!(pack_table(&l, &table).unwrap(), words);
    }

    #[test]
    fn test_field_spanning_three_small_words() {
        let l = layout(vec![TableField::new("X", 4, 19, FieldSubtype::Int)], 8);
        assert_eq!(l.words_per_row(), 3);
        let mut table = ColumnTable::new();
        table.insert("X", vec![-2i16, 12345]);
        let words = pack_table(&l, &table).unwrap();
        assert!(words.iter().all(|w| *w <= 0xFF));
        assert_eq!(unpack_table(&l, &words).unwrap(), table);
    }

    #[test]
    fn test_sign_extension() {
        assert_eq!(sign_extend(0xFFFF_FFFB, 32), -5);
        assert_eq!(sign_extend(0b100, 3), -4);
        assert_eq!(sign_extend(0b011, 3), 3);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_enum_code_without_label() {
        let f = TableField::new("T", 0, 3, FieldSubtype::Enum).with_labels(["A", "B"]);
        let l = layout(vec![f], 32);
        assert!(matches!(unpack_table(&l, &[2]), Err(Error::Range(_))));
        assert_eq!(
            unpack_table(&l, &[1]).unwrap().get("T"),
            Some(&Column::Labels(vec!["B".into()]))
        );
    }

    #[test]
    fn test_pack_errors() {
        let f_enum = TableField::new("T", 0, 3, FieldSubtype::Enum).with_labels(["A", "B"]);
        let f_int = TableField::new("P", 4, 7, FieldSubtype::Int);
        let f_uint = TableField::new("U", 8, 11, FieldSubtype::Uint);
        let l = layout(vec![f_enum, f_int, f_uint], 32);

        let mut t = ColumnTable::new();
        t.insert("T", vec!["A"]);
        t.insert("P", vec![7i8]);
        t.insert("U", vec![15u8]);
        assert!(pack_table(&l, &t).is_ok());

        let mut bad = t.clone();
        bad.insert("T", vec!["C"]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Format(_))));

        let mut bad = t.clone();
        bad.insert("P", vec![8i8]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Range(_))));

        let mut bad = t.clone();
        bad.insert("P", vec![-9i8]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Range(_))));

        let mut bad = t.clone();
        bad.insert("U", vec![16u8]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Range(_))));

        let mut bad = t.clone();
        bad.insert("U", vec![1u8, 2]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Format(_))));

        let mut bad = t.clone();
        bad.insert("U", vec![1u32]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Format(_))));

        let mut bad = t.clone();
        bad.insert("EXTRA", vec![1u8]);
        assert!(matches!(pack_table(&l, &bad), Err(Error::Format(_))));
    }

    #[test]
    fn test_unpack_rejects_partial_rows_and_wide_words() {
        let l = layout(vec![TableField::new("X", 0, 40, FieldSubtype::Uint)], 32);
        assert!(matches!(unpack_table(&l, &[1, 2, 3]), Err(Error::Format(_))));
        let l = layout(vec![TableField::new("X", 0, 7, FieldSubtype::Uint)], 8);
        assert!(matches!(unpack_table(&l, &[256]), Err(Error::Format(_))));
        let l = l.with_max_length(1);
        assert!(matches!(unpack_table(&l, &[1, 2]), Err(Error::Format(_))));
        assert!(unpack_row(&l, &[1]).is_ok());
        assert!(unpack_row(&l, &[]).is_err());
    }

    #[test]
    fn test_empty_table() {
        let l = layout(vec![TableField::new("X", 0, 7, FieldSubtype::Uint)], 32);
        let t = unpack_table(&l, &[]).unwrap();
        assert_eq!(t.row_count(), 0);
        assert_eq!(pack_table(&l, &t).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_text_columns() {
        let f = TableField::new("P", 0, 31, FieldSubtype::Int);
        let col = Column::from_text(&f, &["-5", "678", " 0 "]).unwrap();
        assert_eq!(col, Column::I32(vec![-5, 678, 0]));
        assert_eq!(col.to_text(), ["-5", "678", "0"]);
        assert!(Column::from_text(&f, &["x"]).is_err());
    }

    fn arb_layout() -> impl Strategy<Value = TableLayout> {
        // Cut the row into consecutive spans, then randomly drop some to leave gaps.
        (1u32..=32, prop::collection::vec((1u32..=40, any::<bool>(), 0u8..3), 1..6)).prop_map(
            |(word_width, spans)| {
                let mut fields = Vec::new();
                let mut low = 0;
                for (i, (width, keep, kind)) in spans.into_iter().enumerate() {
                    let high = low + width - 1;
                    if keep || i == 0 {
                        let name = format!("F{i}");
                        let field = match kind {
                            0 => TableField::new(name, low, high, FieldSubtype::Uint),
                            1 => TableField::new(name, low, high, FieldSubtype::Int),
                            _ => {
                                let n = 1usize << width.min(4);
                                let labels: Vec<String> =
                                    (0..n).map(|j| format!("L{j}")).collect();
                                TableField::new(name, low, high, FieldSubtype::Enum)
                                    .with_labels(labels)
                            }
                        };
                        fields.push(field);
                    }
                    low = high + 1;
                }
                TableLayout::new(fields, word_width).unwrap()
            },
        )
    }

    /// Words that only set bits covered by fields, with enum codes kept in label range.
    fn arb_words(l: TableLayout) -> impl Strategy<Value = (TableLayout, Vec<u32>)> {
        let per_row = l.words_per_row();
        (0usize..4, prop::collection::vec(any::<u64>(), 0..64)).prop_map(move |(rows, seeds)| {
            let mut words = vec![0u32; rows * per_row];
            for (r, chunk) in words.chunks_exact_mut(per_row).enumerate() {
                for (i, field) in l.fields().iter().enumerate() {
                    let seed = seeds.get(r * 8 + i).copied().unwrap_or(0);
                    let mut raw = seed & mask(field.width());
                    if field.subtype == FieldSubtype::Enum {
                        raw %= field.labels().len() as u64;
                    }
                    insert_bits(chunk, field.bit_low, field.bit_high, l.word_width(), raw);
                }
            }
            (l.clone(), words)
        })
    }

    proptest! {
        #[test]
        fn pack_inverts_unpack((l, words) in arb_layout().prop_flat_map(arb_words)) {
            let table = unpack_table(&l, &words).unwrap();
            prop_assert_eq!(table.row_count() * l.words_per_row(), words.len());
            prop_assert_eq!(pack_table(&l, &table).unwrap(), words);
        }

        #[test]
        fn unpack_inverts_pack((l, words) in arb_layout().prop_flat_map(arb_words)) {
            let table = unpack_table(&l, &words).unwrap();
            let repacked = pack_table(&l, &table).unwrap();
            prop_assert_eq!(unpack_table(&l, &repacked).unwrap(), table);
        }
    }
}
