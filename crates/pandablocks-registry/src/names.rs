//! Conversions between the three spellings of a field name.
//!
//! - device form: `SEQ1.TABLE`, what the PandA control port speaks
//! - control form: `SEQ1:TABLE`, what EPICS records are called
//! - display form: `Table`, PascalCase last segment used by GUI descriptions
//!
//! Device and control forms convert into each other, except that `BLOCK:LABEL` maps to
//! the block's `*METADATA.LABEL_<block>` key and cannot be mapped back. The display form
//! throws information away and can only be produced, never converted from.

use crate::{Error, Result};
use core::fmt;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

const LABEL_SUFFIX: &str = ":LABEL";
const METADATA_LABEL_PREFIX: &str = "*METADATA.LABEL_";

fn device_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").expect("device name pattern")
    })
}

fn metadata_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\*METADATA\.LABEL_[A-Za-z0-9_-]+$").expect("metadata name pattern")
    })
}

fn control_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+(:[A-Za-z0-9_-]+)*$").expect("control name pattern")
    })
}

fn display_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+$").expect("display name pattern"))
}

fn alnum_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9]+").expect("alphanumeric pattern"))
}

/// Which of the three spellings a name is in
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NameForm {
    Device,
    Control,
    Display,
}

impl fmt::Display for NameForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameForm::Device => write!(f, "device"),
            NameForm::Control => write!(f, "control"),
            NameForm::Display => write!(f, "display"),
        }
    }
}

impl FromStr for NameForm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "device" | "panda" => Ok(NameForm::Device),
            "control" | "epics" => Ok(NameForm::Control),
            "display" | "pvi" => Ok(NameForm::Display),
            _ => Err(Error::UnknownSource {
                value: s.to_string(),
                kind: "name form tag".to_string(),
            }),
        }
    }
}

/// `BLOCK1.FIELD` or `*METADATA.LABEL_BLOCK1`
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DeviceName(String);

/// `BLOCK1:FIELD`, optionally with a record prefix in front
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ControlName(String);

/// `FieldName`
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DisplayName(String);

impl DeviceName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if device_regex().is_match(&name) || metadata_regex().is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::Format(format!("invalid device name: {name:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the synthetic `*METADATA.LABEL_<block>` keys.
    pub fn is_metadata_label(&self) -> bool {
        self.0.starts_with(METADATA_LABEL_PREFIX)
    }
}

impl ControlName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if control_regex().is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::Format(format!("invalid control name: {name:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full record name `<prefix>:<name>`.
    pub fn with_prefix(&self, prefix: &str) -> Result<ControlName> {
        ControlName::new(format!("{prefix}:{}", self.0))
    }

    /// Inverse of [`ControlName::with_prefix`].
    pub fn strip_prefix(&self, prefix: &str) -> Result<ControlName> {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| {
                Error::Format(format!("{:?} does not start with prefix {prefix:?}", self.0))
            })
            .and_then(|rest| ControlName::new(rest))
    }

    /// Append `:<segment>`.
    pub fn join(&self, segment: &str) -> Result<ControlName> {
        ControlName::new(format!("{}:{segment}", self.0))
    }
}

impl DisplayName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if display_regex().is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::Format(format!("invalid display name: {name:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! name_traits {
    ($($ty:ident),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                $ty::new(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    )*};
}

name_traits!(DeviceName, ControlName, DisplayName);

/// A name tagged with the form it is spelled in
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Name {
    Device(DeviceName),
    Control(ControlName),
    Display(DisplayName),
}

impl Name {
    /// Validate `text` as a name in `form`.
    pub fn parse(form: NameForm, text: &str) -> Result<Name> {
        Ok(match form {
            NameForm::Device => Name::Device(DeviceName::new(text)?),
            NameForm::Control => Name::Control(ControlName::new(text)?),
            NameForm::Display => Name::Display(DisplayName::new(text)?),
        })
    }

    pub fn form(&self) -> NameForm {
        match self {
            Name::Device(_) => NameForm::Device,
            Name::Control(_) => NameForm::Control,
            Name::Display(_) => NameForm::Display,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Name::Device(n) => n.as_str(),
            Name::Control(n) => n.as_str(),
            Name::Display(n) => n.as_str(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DeviceName> for Name {
    fn from(n: DeviceName) -> Self {
        Name::Device(n)
    }
}

impl From<ControlName> for Name {
    fn from(n: ControlName) -> Self {
        Name::Control(n)
    }
}

impl From<DisplayName> for Name {
    fn from(n: DisplayName) -> Self {
        Name::Display(n)
    }
}

pub fn to_device_form(name: &Name) -> Result<DeviceName> {
    match name {
        Name::Device(n) => Ok(n.clone()),
        Name::Control(n) => control_to_device(n),
        Name::Display(_) => Err(Error::NotSupported {
            from: NameForm::Display,
            to: NameForm::Device,
        }),
    }
}

pub fn to_control_form(name: &Name) -> Result<ControlName> {
    match name {
        Name::Control(n) => Ok(n.clone()),
        Name::Device(n) => device_to_control(n),
        Name::Display(_) => Err(Error::NotSupported {
            from: NameForm::Display,
            to: NameForm::Control,
        }),
    }
}

pub fn to_display_form(name: &Name) -> Result<DisplayName> {
    match name {
        Name::Display(n) => Ok(n.clone()),
        Name::Control(n) => control_to_display(n),
        Name::Device(_) => Err(Error::NotSupported {
            from: NameForm::Device,
            to: NameForm::Display,
        }),
    }
}

/// Convert `name` into `target` form, rejecting the undefined cells of the matrix.
pub fn convert(name: &Name, target: NameForm) -> Result<Name> {
    Ok(match target {
        NameForm::Device => Name::Device(to_device_form(name)?),
        NameForm::Control => Name::Control(to_control_form(name)?),
        NameForm::Display => Name::Display(to_display_form(name)?),
    })
}

fn control_to_device(name: &ControlName) -> Result<DeviceName> {
    let raw = name.as_str();
    if raw.ends_with(LABEL_SUFFIX) {
        let mut block = raw
            .rsplit(':')
            .nth(1)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::Format(format!("no block name in {raw:?}")))?
            .to_string();
        if !block.ends_with(|c: char| c.is_ascii_digit()) {
            block.push('1');
        }
        return DeviceName::new(format!("{METADATA_LABEL_PREFIX}{block}"));
    }
    DeviceName::new(raw.replace(':', "."))
}

fn device_to_control(name: &DeviceName) -> Result<ControlName> {
    if name.is_metadata_label() {
        return Err(Error::NotSupported {
            from: NameForm::Device,
            to: NameForm::Control,
        });
    }
    ControlName::new(name.as_str().replace('.', ":"))
}

fn control_to_display(name: &ControlName) -> Result<DisplayName> {
    let last = name.as_str().rsplit(':').next().unwrap_or_default();
    let capitalised: String = last.replace('-', "_").split('_').map(capitalise).collect();
    let word = alnum_run_regex()
        .find(&capitalised)
        .ok_or_else(|| Error::Format(format!("no alphanumeric characters in {name}")))?;
    DisplayName::new(word.as_str())
}

/// First character upper case, the rest lower case.
fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
