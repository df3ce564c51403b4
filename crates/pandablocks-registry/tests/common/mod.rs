#![allow(dead_code)]

use pandablocks_registry::{FieldSubtype, TableField, TableLayout};

pub const TRIGGER_LABELS: [&str; 13] = [
    "Immediate",
    "BITA=0",
    "BITA=1",
    "BITB=0",
    "BITB=1",
    "BITC=0",
    "BITC=1",
    "POSA>=POSITION",
    "POSA<=POSITION",
    "POSB>=POSITION",
    "POSB<=POSITION",
    "POSC>=POSITION",
    "POSC<=POSITION",
];

/// Three rows of a SEQ table, four words each.
pub const TABLE_WORDS: [u32; 12] = [
    2457862149, 4294967291, 100, 0, //
    269877248, 678, 0, 55, //
    4293968720, 0, 9, 9999,
];

fn bit(name: &str, n: u32, phase: &str) -> TableField {
    TableField::new(name, n, n, FieldSubtype::Uint)
        .with_description(format!("Output {} value during phase {phase}", &name[3..4]))
}

/// Field definitions of a SEQ.TABLE, in the order the device lists them.
pub fn seq_fields() -> Vec<TableField> {
    vec![
        TableField::new("REPEATS", 0, 15, FieldSubtype::Uint)
            .with_description("Number of times the line will repeat"),
        TableField::new("TRIGGER", 16, 19, FieldSubtype::Enum)
            .with_labels(TRIGGER_LABELS)
            .with_description("The trigger condition to start the phases"),
        TableField::new("POSITION", 32, 63, FieldSubtype::Int)
            .with_description("The position that can be used in trigger condition"),
        TableField::new("TIME1", 64, 95, FieldSubtype::Uint)
            .with_description("The time the optional phase 1 should take"),
        bit("OUTA1", 20, "1"),
        bit("OUTB1", 21, "1"),
        bit("OUTC1", 22, "1"),
        bit("OUTD1", 23, "1"),
        bit("OUTE1", 24, "1"),
        bit("OUTF1", 25, "1"),
        TableField::new("TIME2", 96, 127, FieldSubtype::Uint)
            .with_description("The time the mandatory phase 2 should take"),
        bit("OUTA2", 26, "2"),
        bit("OUTB2", 27, "2"),
        bit("OUTC2", 28, "2"),
        bit("OUTD2", 29, "2"),
        bit("OUTE2", 30, "2"),
        bit("OUTF2", 31, "2"),
    ]
}

pub fn seq_layout() -> TableLayout {
    TableLayout::new(seq_fields(), 32)
        .unwrap()
        .with_words_per_row(4)
        .unwrap()
        .with_max_length(16384)
        .with_description("Sequencer table of lines")
}
