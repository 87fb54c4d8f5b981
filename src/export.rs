//! CSV snapshots of each pipeline stage.

use anyhow::{Context, Result};
use csv::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;

use crate::amazon::Product;
use crate::reddit::{Mention, RawMention};

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!("💾 Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = Reader::from_reader(file);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn write_products(path: &Path, products: &[Product]) -> Result<()> {
    write_rows(path, products)
}

pub fn read_products(path: &Path) -> Result<Vec<Product>> {
    read_rows(path)
}

pub fn write_raw_mentions(path: &Path, mentions: &[RawMention]) -> Result<()> {
    write_rows(path, mentions)
}

pub fn write_mentions(path: &Path, mentions: &[Mention]) -> Result<()> {
    write_rows(path, mentions)
}

pub fn read_mentions(path: &Path) -> Result<Vec<Mention>> {
    read_rows(path)
}
