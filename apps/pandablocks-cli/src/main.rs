use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};
use std::fs;
use std::sync::Arc;
use tracing::info;

use pandablocks_registry as reg;
use pandablocks_registry::{Column, ColumnTable, ControlName, DataKind, MetricsHub, Name, NameForm};
use pandablocks_wire::{DeviceClient, MockClient, CHANGES_COMMAND};

#[derive(Parser, Debug)]
#[command(
    name = "pandactl",
    version,
    about = "PandA field names, tables and records",
    disable_help_subcommand = true
)]
struct Cli {
    /// Print codec metrics in Prometheus text format when done
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a name between device, control and display forms
    Name {
        /// Form of the input: device|panda, control|epics, display|pvi
        #[arg(long)]
        from: String,
        /// Form to convert to
        #[arg(long)]
        to: String,
        name: String,
    },
    /// Validate table layout YAML files
    LayoutCheck {
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        dir: Option<String>,
        /// Print the parsed fields as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Unpack table words into columns (printed as JSON)
    TableUnpack {
        /// Layout YAML file
        #[arg(long)]
        layout: String,
        /// File of decimal words, whitespace separated
        #[arg(long)]
        words_file: Option<String>,
        /// Decode only this row (0-based)
        #[arg(long)]
        row: Option<usize>,
        /// Words given inline
        words: Vec<u32>,
    },
    /// Pack a JSON object of columns into table words
    TablePack {
        #[arg(long)]
        layout: String,
        /// JSON file mapping field name to an array of cells
        #[arg(long)]
        columns: String,
    },
    /// List the records a table would be published as
    PlanRecords {
        #[arg(long)]
        layout: String,
        /// Control name of the table, e.g. SEQ1:TABLE
        #[arg(long)]
        table: String,
    },
    /// Route a recorded *CHANGES? reply as if it came from a device
    Changes {
        /// File holding the raw multiline reply
        #[arg(long)]
        file: String,
        /// How to decode every scalar change
        #[arg(long, value_enum, default_value_t = Kind::Text)]
        kind: Kind,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Kind {
    Analog,
    Long,
    Bool,
    Text,
    LongText,
}

impl Kind {
    fn data_kind(self) -> DataKind {
        match self {
            Kind::Analog => DataKind::Analog,
            Kind::Long => DataKind::Long,
            Kind::Bool => DataKind::Bool,
            Kind::Text => DataKind::Text,
            Kind::LongText => DataKind::LongText,
        }
    }
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let hub = MetricsHub::new().map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Name { from, to, name } => name_convert(&from, &to, &name),
        Commands::LayoutCheck { file, dir, json } => {
            layout_check(&hub, file.as_deref(), dir.as_deref(), json)
        }
        Commands::TableUnpack {
            layout,
            words_file,
            row,
            words,
        } => table_unpack(&hub, &layout, words_file.as_deref(), row, words),
        Commands::TablePack { layout, columns } => table_pack(&hub, &layout, &columns),
        Commands::PlanRecords { layout, table } => plan_records(&layout, &table),
        Commands::Changes { file, kind } => route_changes(&hub, &file, kind),
    }?;

    if cli.metrics {
        print!("{}", hub.encode_text());
    }
    Ok(())
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn name_convert(from: &str, to: &str, name: &str) -> Result<()> {
    let from: NameForm = from.parse()?;
    let to: NameForm = to.parse()?;
    let parsed = Name::parse(from, name)?;
    let converted = reg::convert(&parsed, to)?;
    println!("{converted}");
    Ok(())
}

fn layout_check(hub: &MetricsHub, file: Option<&str>, dir: Option<&str>, json: bool) -> Result<()> {
    match (file, dir) {
        (Some(f), None) => {
            let (name, layout) = reg::load_layout_file(f)?;
            hub.codec.layouts_loaded.set(1);
            println!(
                "ok: {name} ({} fields, {} words per row)",
                layout.fields().len(),
                layout.words_per_row()
            );
            if json {
                println!("{}", serde_json::to_string_pretty(layout.fields())?);
            }
        }
        (None, Some(d)) => {
            let registry = reg::load_layouts_dir(d)?;
            hub.codec.layouts_loaded.set(registry.layouts.len() as i64);
            println!("ok: loaded {} layouts", registry.layouts.len());
            let mut names: Vec<&String> = registry.layouts.keys().collect();
            names.sort();
            for name in names {
                if let Some(layout) = registry.get(name) {
                    println!("{name}\twords_per_row={}", layout.words_per_row());
                    if json {
                        println!("{}", serde_json::to_string_pretty(layout.fields())?);
                    }
                }
            }
        }
        _ => {
            return Err(anyhow::anyhow!("provide --file <path> or --dir <dir>"));
        }
    }
    Ok(())
}

fn table_unpack(
    hub: &MetricsHub,
    layout_path: &str,
    words_file: Option<&str>,
    row: Option<usize>,
    mut words: Vec<u32>,
) -> Result<()> {
    let (name, layout) = reg::load_layout_file(layout_path)?;
    if let Some(path) = words_file {
        let raw = fs::read_to_string(path).with_context(|| format!("reading words: {path}"))?;
        let lines: Vec<&str> = raw.split_whitespace().collect();
        words.extend(pandablocks_wire::parse_words(&lines)?);
    }
    let decoded = match row {
        Some(n) => {
            let per_row = layout.words_per_row();
            let chunk = words
                .chunks(per_row)
                .nth(n)
                .ok_or_else(|| anyhow::anyhow!("no row {n} in {} words", words.len()))?;
            reg::unpack_row(&layout, chunk)
        }
        None => reg::unpack_table(&layout, &words),
    };
    let table = decoded.inspect_err(|_| hub.codec.codec_errors.inc())?;
    hub.codec.tables_unpacked.inc();
    info!(table = %name, rows = table.row_count(), "unpacked");

    let mut out = Map::new();
    for (field, column) in table.iter() {
        out.insert(field.to_string(), column_json(column));
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
    Ok(())
}

fn column_json(column: &Column) -> Value {
    match column {
        Column::U8(v) => json!(v),
        Column::U16(v) => json!(v),
        Column::U32(v) => json!(v),
        Column::U64(v) => json!(v),
        Column::I8(v) => json!(v),
        Column::I16(v) => json!(v),
        Column::I32(v) => json!(v),
        Column::I64(v) => json!(v),
        Column::Labels(v) => json!(v),
    }
}

fn table_pack(hub: &MetricsHub, layout_path: &str, columns_path: &str) -> Result<()> {
    let (_, layout) = reg::load_layout_file(layout_path)?;
    let raw = fs::read_to_string(columns_path)
        .with_context(|| format!("reading columns: {columns_path}"))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing json: {columns_path}"))?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("{columns_path}: expected an object of columns"))?;

    let mut table = ColumnTable::new();
    for (name, cells) in object {
        let field = layout
            .field(name)
            .ok_or_else(|| anyhow::anyhow!("column {name} is not a table field"))?;
        let cells = cells
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("column {name}: expected an array"))?;
        let text: Vec<String> = cells
            .iter()
            .map(|c| match c {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(anyhow::anyhow!("column {name}: bad cell {other}")),
            })
            .collect::<Result<_>>()?;
        table.insert(name.clone(), Column::from_text(field, &text)?);
    }

    let words = reg::pack_table(&layout, &table).inspect_err(|_| hub.codec.codec_errors.inc())?;
    hub.codec.tables_packed.inc();
    for w in words {
        println!("{w}");
    }
    Ok(())
}

fn plan_records(layout_path: &str, table: &str) -> Result<()> {
    let (_, layout) = reg::load_layout_file(layout_path)?;
    let table = ControlName::new(table)?;
    for spec in reg::plan_table_records(&table, &layout)? {
        let labels = spec.labels.as_ref().map(|l| l.join(",")).unwrap_or_default();
        println!(
            "{}\t{}\tlength={}\tdesc={}\tlabels={labels}",
            spec.name,
            spec.kind.record_type(),
            spec.length.map(|n| n.to_string()).unwrap_or_default(),
            spec.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn route_changes(hub: &MetricsHub, file: &str, kind: Kind) -> Result<()> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading changes: {file}"))?;
    let mut client = MockClient::new();
    client.respond_to(CHANGES_COMMAND, raw);
    let set = client.changes()?;

    let mut router: reg::ChangeRouter<()> =
        reg::ChangeRouter::new().with_metrics(hub.codec.clone());
    for change in &set.changes {
        let name = reg::DeviceName::new(change.field())?;
        if router.get(name.as_str()).is_none() {
            router.insert(name, Arc::new(reg::RecordInfo::new(kind.data_kind(), false)));
        }
    }

    for update in router.route(&set) {
        match update {
            reg::Update::Value { name, value } => println!("{name}\t{value:?}"),
            reg::Update::Table { name } => println!("{name}\t<table changed>"),
        }
    }
    Ok(())
}
