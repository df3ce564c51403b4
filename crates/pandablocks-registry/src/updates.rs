use crate::coerce::FieldValue;
use crate::metrics::CodecMetrics;
use crate::names::DeviceName;
use crate::record_info::{ChangeAction, RecordInfo};
use pandablocks_wire::{Change, ChangeSet};
use std::collections::HashMap;
use std::sync::Arc;

/// A change that should reach a record
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Value { name: DeviceName, value: FieldValue },
    /// Table content changed and has to be read back
    Table { name: DeviceName },
}

/// Routes `*CHANGES?` results to the records they belong to.
///
/// Owned by the task that polls the device; the record infos it holds are shared with
/// the write path through `Arc`.
pub struct ChangeRouter<H> {
    records: HashMap<String, Arc<RecordInfo<H>>>,
    metrics: Option<CodecMetrics>,
}

impl<H> Default for ChangeRouter<H> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            metrics: None,
        }
    }
}

impl<H> ChangeRouter<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: CodecMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn insert(&mut self, name: DeviceName, info: Arc<RecordInfo<H>>) {
        self.records.insert(name.as_str().to_string(), info);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordInfo<H>>> {
        self.records.get(name)
    }

    /// Work out which changes need passing on. Echoes of our own writes are dropped;
    /// fields that cannot be decoded or named are logged and skipped. Each record's
    /// change hook runs for the values that get through.
    pub fn route(&self, set: &ChangeSet) -> Vec<Update> {
        let mut out = Vec::new();
        for change in &set.changes {
            let field = change.field();
            let name = match DeviceName::new(field) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(field, error = %e, "ignoring change with bad name");
                    continue;
                }
            };
            match change {
                Change::Table { .. } => out.push(Update::Table { name }),
                Change::Scalar { value, .. } => {
                    let Some(info) = self.records.get(field) else {
                        tracing::warn!(field, "change for unknown field");
                        continue;
                    };
                    if info.on_device_change(value, field) == ChangeAction::Suppress {
                        tracing::debug!(field, "suppressed echo of own write");
                        if let Some(m) = &self.metrics {
                            m.echoes_suppressed.inc();
                        }
                        continue;
                    }
                    match info.decode(value, field) {
                        Ok(value) => {
                            info.notify(&value);
                            out.push(Update::Value { name, value });
                        }
                        Err(e) => {
                            tracing::error!(field, error = %e, "cannot decode change");
                            if let Some(m) = &self.metrics {
                                m.codec_errors.inc();
                            }
                        }
                    }
                }
            }
        }
        out
    }
}
