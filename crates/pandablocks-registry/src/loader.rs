use crate::fields::{TableInfo, TableLayout};
use anyhow::Context;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Table layouts keyed by the device name of their table field
#[derive(Debug, Default, Clone)]
pub struct LayoutRegistry {
    pub layouts: HashMap<String, TableLayout>,
}

impl LayoutRegistry {
    pub fn insert(&mut self, name: String, layout: TableLayout) {
        self.layouts.insert(name, layout);
    }

    pub fn get(&self, name: &str) -> Option<&TableLayout> {
        self.layouts.get(name)
    }
}

pub fn load_layout_file(path: impl AsRef<Path>) -> anyhow::Result<(String, TableLayout)> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading layout: {}", path.display()))?;
    let val: Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    let info: TableInfo = serde_yaml::from_value(val)
        .with_context(|| format!("decoding layout: {}", path.display()))?;
    let name = info.name.clone();
    let layout = info
        .into_layout()
        .with_context(|| format!("validating layout {name}: {}", path.display()))?;
    Ok((name, layout))
}

pub fn load_layouts_dir(dir: impl AsRef<Path>) -> anyhow::Result<LayoutRegistry> {
    let mut reg = LayoutRegistry::default();
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    for p in entries {
        let (name, layout) = load_layout_file(&p)?;
        reg.insert(name, layout);
    }
    Ok(reg)
}
