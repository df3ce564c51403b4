mod common;

use common::{seq_fields, seq_layout, TABLE_WORDS, TRIGGER_LABELS};
use pandablocks_registry::{
    fetch_table_layout, pack_table, plan_table_records, read_table, register_all, unpack_table,
    write_table, Column, ColumnTable, ControlName, DeviceName, Error, FieldSubtype, RecordRegistrar,
    RecordSpec, TableField, TableLayout,
};
use pandablocks_wire::{format_table_put, DeviceClient, MockClient};

fn expected_columns() -> ColumnTable {
    let mut t = ColumnTable::new();
    t.insert("REPEATS", vec![5u16, 0, 50000]);
    t.insert("TRIGGER", vec!["Immediate", "BITC=1", "Immediate"]);
    t.insert("POSITION", vec![-5i32, 678, 0]);
    t.insert("TIME1", vec![100u32, 0, 9]);
    t.insert("OUTA1", vec![0u8, 1, 1]);
    t.insert("OUTB1", vec![0u8, 0, 1]);
    t.insert("OUTC1", vec![0u8, 0, 1]);
    t.insert("OUTD1", vec![1u8, 0, 1]);
    t.insert("OUTE1", vec![0u8, 0, 1]);
    t.insert("OUTF1", vec![1u8, 0, 1]);
    t.insert("TIME2", vec![0u32, 55, 9999]);
    t.insert("OUTA2", vec![0u8, 0, 1]);
    t.insert("OUTB2", vec![0u8, 0, 1]);
    t.insert("OUTC2", vec![1u8, 1, 1]);
    t.insert("OUTD2", vec![0u8, 0, 1]);
    t.insert("OUTE2", vec![0u8, 0, 1]);
    t.insert("OUTF2", vec![1u8, 0, 1]);
    t
}

#[test]
fn test_unpack_fixture() {
    let table = unpack_table(&seq_layout(), &TABLE_WORDS).unwrap();
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.get("REPEATS"), Some(&Column::U16(vec![5, 0, 50000])));
    assert_eq!(
        table.get("TRIGGER"),
        Some(&Column::from(vec!["Immediate", "BITC=1", "Immediate"]))
    );
    assert_eq!(table.get("POSITION"), Some(&Column::I32(vec![-5, 678, 0])));
    assert_eq!(table, expected_columns());

    // columns come out in declaration order, not bit order
    let names: Vec<&str> = table.names().collect();
    let declared: Vec<String> = seq_fields().into_iter().map(|f| f.name).collect();
    assert_eq!(names, declared);
}

#[test]
fn test_pack_fixture() {
    let words = pack_table(&seq_layout(), &expected_columns()).unwrap();
    assert_eq!(words, TABLE_WORDS);
}

#[test]
fn test_trigger_code_six() {
    assert_eq!(TRIGGER_LABELS.len(), 13);
    let layout = TableLayout::new(
        vec![TableField::new("TRIGGER", 16, 19, FieldSubtype::Enum).with_labels(TRIGGER_LABELS)],
        32,
    )
    .unwrap();
    let table = unpack_table(&layout, &[0b0110 << 16]).unwrap();
    assert_eq!(table.get("TRIGGER"), Some(&Column::from(vec!["BITC=1"])));
}

fn mock_panda() -> MockClient {
    let mut client = MockClient::new();
    client.respond_to("*DESC.SEQ.TABLE?", "OK =Sequencer table of lines");
    client.respond_to("SEQ.TABLE.MAX_LENGTH?", "OK =16384");
    client.respond_to(
        "SEQ.TABLE.FIELDS?",
        "!15:0 REPEATS uint\n!19:16 TRIGGER enum\n!63:32 POSITION int\n\
         !95:64 TIME1 uint\n!20:20 OUTA1 uint\n!21:21 OUTB1 uint\n!22:22 OUTC1 uint\n\
         !23:23 OUTD1 uint\n!24:24 OUTE1 uint\n!25:25 OUTF1 uint\n!127:96 TIME2 uint\n\
         !26:26 OUTA2 uint\n!27:27 OUTB2 uint\n!28:28 OUTC2 uint\n!29:29 OUTD2 uint\n\
         !30:30 OUTE2 uint\n!31:31 OUTF2 uint\n.",
    );
    let labels: String = TRIGGER_LABELS.iter().map(|l| format!("!{l}\n")).collect();
    client.respond_to("*ENUMS.SEQ.TABLE[].TRIGGER?", format!("{labels}."));
    for f in seq_fields() {
        let desc = f.description.unwrap_or_default();
        client.respond_to(format!("*DESC.SEQ.TABLE[].{}?", f.name), format!("OK ={desc}"));
    }
    let dump: String = TABLE_WORDS.iter().map(|w| format!("!{w}\n")).collect();
    client.respond_to("SEQ1.TABLE?", format!("{dump}."));
    client
}

#[test]
fn test_introspect_and_read() {
    let mut client = mock_panda();
    let layout =
        fetch_table_layout(&mut client, &DeviceName::new("SEQ.TABLE").unwrap(), 32).unwrap();
    assert_eq!(layout, seq_layout());

    let table = read_table(&mut client, &DeviceName::new("SEQ1.TABLE").unwrap(), &layout).unwrap();
    assert_eq!(table, expected_columns());
}

#[test]
fn test_write_table() {
    let mut client = mock_panda();
    client.enqueue("OK");
    let name = DeviceName::new("SEQ1.TABLE").unwrap();
    write_table(&mut client, &name, &seq_layout(), &expected_columns()).unwrap();
    assert_eq!(
        client.sent().last().map(String::as_str),
        Some(format_table_put("SEQ1.TABLE", &TABLE_WORDS).as_str())
    );
}

#[test]
fn test_introspect_bad_subtype() {
    let mut client = MockClient::new();
    client.respond_to("*DESC.SEQ.TABLE?", "OK =Sequencer");
    client.respond_to("SEQ.TABLE.MAX_LENGTH?", "OK =16");
    client.respond_to("SEQ.TABLE.FIELDS?", "!15:0 REPEATS float\n.");
    let err = fetch_table_layout(&mut client, &DeviceName::new("SEQ.TABLE").unwrap(), 32)
        .unwrap_err();
    assert!(matches!(err, Error::Format(_)));
    // the device is still usable afterwards
    assert!(client.get("*DESC.SEQ.TABLE").is_ok());
}

#[test]
fn test_introspect_field_too_wide() {
    let mut client = MockClient::new();
    client.respond_to("*DESC.SEQ.TABLE?", "OK =Sequencer");
    client.respond_to("SEQ.TABLE.MAX_LENGTH?", "OK =16");
    client.respond_to("SEQ.TABLE.FIELDS?", "!4294967295:0 REPEATS uint\n.");
    client.respond_to("*DESC.SEQ.TABLE[].REPEATS?", "OK =Repeats");
    let err = fetch_table_layout(&mut client, &DeviceName::new("SEQ.TABLE").unwrap(), 32)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[derive(Default)]
struct CollectingRegistrar {
    created: Vec<RecordSpec>,
}

impl RecordRegistrar for CollectingRegistrar {
    type Handle = usize;

    fn register(&mut self, spec: &RecordSpec) -> pandablocks_registry::Result<usize> {
        self.created.push(spec.clone());
        Ok(self.created.len() - 1)
    }
}

fn register_table(
    registrar: &mut CollectingRegistrar,
    fields: Vec<TableField>,
) -> pandablocks_registry::Result<Vec<usize>> {
    let layout = TableLayout::new(fields, 32)?;
    let specs = plan_table_records(&ControlName::new("SEQ1:TABLE")?, &layout)?;
    register_all(registrar, &specs)
}

#[test]
fn test_register_table_records() {
    let mut registrar = CollectingRegistrar::default();
    let handles = register_table(&mut registrar, seq_fields()).unwrap();
    assert_eq!(handles.len(), 17);
    assert_eq!(registrar.created[1].name.as_str(), "SEQ1:TABLE:TRIGGER");
    assert_eq!(registrar.created[1].labels.as_ref().map(Vec::len), Some(13));
}

#[test]
fn test_too_many_labels_registers_nothing() {
    let mut registrar = CollectingRegistrar::default();
    let mut fields = seq_fields();
    let labels: Vec<String> = (0..17).map(|i| format!("L{i}")).collect();
    fields[1] = TableField::new("TRIGGER", 16, 20, FieldSubtype::Enum).with_labels(labels);
    fields.retain(|f| f.name != "OUTA1");

    let err = register_table(&mut registrar, fields).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(registrar.created.is_empty());
}
