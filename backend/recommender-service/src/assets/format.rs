use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

const ZSTD_LEVEL: i32 = 3;

pub fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

pub fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// zstd-compressed bincode, used for the columnar tables.
pub fn read_compressed<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let compressed = fs::read(path)?;
    let bytes = zstd::decode_all(&compressed[..])?;
    Ok(bincode::deserialize(&bytes)?)
}

pub fn write_compressed<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    let compressed = zstd::encode_all(&bytes[..], ZSTD_LEVEL)?;
    fs::write(path, compressed)?;
    Ok(())
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
