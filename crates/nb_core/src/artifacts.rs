//! Load and save the JSON files the stages hand to each other.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{ArticleRecords, UploadedImages};
use crate::{Error, Result};

// Pretty-printed with 2-space indent; serde_json leaves non-ASCII text
// unescaped, so umlauts survive readably.
fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| Error::File(format!("{}: {}", path.display(), e)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::File(format!("{}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_records(records: &ArticleRecords, path: &Path) -> Result<()> {
    write_json(records, path)
}

pub fn load_records(path: &Path) -> Result<ArticleRecords> {
    read_json(path)
}

pub fn save_image_urls(urls: &UploadedImages, path: &Path) -> Result<()> {
    write_json(urls, path)
}

pub fn load_image_urls(path: &Path) -> Result<UploadedImages> {
    read_json(path)
}
