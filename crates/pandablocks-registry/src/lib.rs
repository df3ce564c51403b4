//! pandablocks-registry: PandA field metadata, table codec and record bookkeeping

mod error;
pub use error::{Error, Result};

pub mod names;
pub use names::{
    convert, to_control_form, to_device_form, to_display_form, ControlName, DeviceName,
    DisplayName, Name, NameForm,
};

mod fields;
pub use fields::{
    check_num_labels, trim_description, FieldSubtype, TableField, TableInfo, TableLayout,
    DEFAULT_WORD_WIDTH, DESCRIPTION_LIMIT, MAX_LABELS,
};

mod table;
pub use table::{pack_table, unpack_row, unpack_table, Column, ColumnTable, ColumnType};

mod coerce;
pub use coerce::{
    trim_string_value, DataKind, FieldValue, ScalarValue, ONAM_STR, STRING_LIMIT, ZNAM_STR,
};

mod record_info;
pub use record_info::{ChangeAction, ChangeHook, RecordInfo};

mod records;
pub use records::{
    plan_scalar_record, plan_table_records, register_all, RecordKind, RecordRegistrar, RecordSpec,
};

mod updates;
pub use updates::{ChangeRouter, Update};

mod introspect;
pub use introspect::{fetch_table_layout, read_table, write_table};

mod loader;
pub use loader::{load_layout_file, load_layouts_dir, LayoutRegistry};

mod metrics;
pub use metrics::{CodecMetrics, MetricsHub};
