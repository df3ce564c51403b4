use crate::fields::{FieldSubtype, TableField, TableLayout};
use crate::names::DeviceName;
use crate::table::{pack_table, unpack_table, ColumnTable};
use crate::{Error, Result};
use pandablocks_wire::{parse_table_field_line, DeviceClient};

/// Ask the device for the layout of table field `field` (e.g. `SEQ.TABLE`).
pub fn fetch_table_layout<C: DeviceClient>(
    client: &mut C,
    field: &DeviceName,
    word_width: u32,
) -> Result<TableLayout> {
    let description = client.get(&format!("*DESC.{field}"))?;
    let max_length = client.get(&format!("{field}.MAX_LENGTH"))?;
    let max_length = max_length
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::Format(format!("{field}.MAX_LENGTH: {max_length:?}")))?;

    let mut fields = Vec::new();
    for line in client.get_multiline(&format!("{field}.FIELDS?"))? {
        let parsed = parse_table_field_line(&line)?;
        let subtype: FieldSubtype = parsed.subtype.parse()?;
        let mut f = TableField::new(parsed.name, parsed.bit_low, parsed.bit_high, subtype);
        if subtype == FieldSubtype::Enum {
            let labels = client.get_multiline(&format!("*ENUMS.{field}[].{}?", f.name))?;
            f = f.with_labels(labels);
        }
        let desc = client.get(&format!("*DESC.{field}[].{}", f.name))?;
        fields.push(f.with_description(desc));
    }
    tracing::debug!(%field, fields = fields.len(), max_length, "fetched table layout");

    Ok(TableLayout::new(fields, word_width)?
        .with_max_length(max_length)
        .with_description(description))
}

/// Read and unpack the current content of a table.
pub fn read_table<C: DeviceClient>(
    client: &mut C,
    field: &DeviceName,
    layout: &TableLayout,
) -> Result<ColumnTable> {
    let words = client.get_table(field.as_str())?;
    unpack_table(layout, &words)
}

/// Pack and write a whole table.
pub fn write_table<C: DeviceClient>(
    client: &mut C,
    field: &DeviceName,
    layout: &TableLayout,
    table: &ColumnTable,
) -> Result<()> {
    let words = pack_table(layout, table)?;
    client.put_table(field.as_str(), &words)?;
    Ok(())
}
