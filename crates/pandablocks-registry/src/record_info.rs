use crate::coerce::{DataKind, FieldValue, ScalarValue};
use crate::fields::TableField;
use crate::{Error, Result};
use pandablocks_wire::WireValue;
use std::fmt;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Called with every genuine device change of a record
pub type ChangeHook = Box<dyn Fn(&FieldValue) + Send + Sync>;

/// What to do with a device change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Echo of our own write: drop it
    Suppress,
    /// Genuine change: pass it on to the record
    Propagate,
}

/// A record plus what is needed to keep it in step with the device.
///
/// `H` is whatever handle the record layer hands back on creation. The pending write
/// slot is locked per instance, so the write path and the change poller can share one
/// `Arc<RecordInfo<H>>` without any wider locking.
pub struct RecordInfo<H> {
    kind: DataKind,
    is_in_record: bool,
    field: Option<TableField>,
    record: OnceLock<H>,
    pending: Mutex<Option<String>>,
    on_change: Option<ChangeHook>,
}

impl<H: fmt::Debug> fmt::Debug for RecordInfo<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordInfo")
            .field("kind", &self.kind)
            .field("is_in_record", &self.is_in_record)
            .field("field", &self.field)
            .field("record", &self.record)
            .field("pending", &self.pending)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl<H> RecordInfo<H> {
    pub fn new(kind: DataKind, is_in_record: bool) -> Self {
        Self {
            kind,
            is_in_record,
            field: None,
            record: OnceLock::new(),
            pending: Mutex::new(None),
            on_change: None,
        }
    }

    /// Run `hook` for each change that is not an echo of our own write.
    pub fn with_on_change(mut self, hook: impl Fn(&FieldValue) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    pub fn notify(&self, value: &FieldValue) {
        if let Some(hook) = &self.on_change {
            hook(value);
        }
    }

    pub fn with_field(mut self, field: TableField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn kind(&self) -> &DataKind {
        &self.kind
    }

    /// Labels of a multi-state record; `None` for every other kind.
    pub fn labels(&self) -> Option<&[String]> {
        self.kind.labels()
    }

    pub fn is_in_record(&self) -> bool {
        self.is_in_record
    }

    pub fn field(&self) -> Option<&TableField> {
        self.field.as_ref()
    }

    /// Attach the created record. Only the first call succeeds.
    pub fn bind(&self, handle: H) -> Result<()> {
        self.record.set(handle).map_err(|_| Error::AlreadyBound)
    }

    pub fn record(&self) -> Option<&H> {
        self.record.get()
    }

    pub fn decode(&self, wire: &WireValue, field: &str) -> Result<FieldValue> {
        self.kind.decode(wire, field)
    }

    /// Encode a value written from the control side and remember it, so that the
    /// device echoing it back is not taken for an external change.
    pub fn prepare_write(&self, value: &ScalarValue, field: &str) -> Result<String> {
        let wire = self.kind.encode(value, field)?;
        self.note_write(&wire);
        Ok(wire)
    }

    pub fn note_write(&self, wire: &str) {
        *self.lock_pending() = Some(wire.to_string());
    }

    pub fn is_pending(&self) -> bool {
        self.lock_pending().is_some()
    }

    /// Check a device notification against the pending write, clearing it on a match.
    pub fn on_device_change(&self, wire: &WireValue, field: &str) -> ChangeAction {
        let mut pending = self.lock_pending();
        let Some(written) = pending.as_deref() else {
            return ChangeAction::Propagate;
        };
        let matches = match wire {
            WireValue::InError => false,
            WireValue::Text(text) => {
                text == written
                    || matches!(
                        (self.kind.decode_text(text, field), self.kind.decode_text(written, field)),
                        (Ok(a), Ok(b)) if a == b
                    )
            }
        };
        if matches {
            *pending = None;
            ChangeAction::Suppress
        } else {
            ChangeAction::Propagate
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<String>> {
        // plain data, still valid after a poisoning panic
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
