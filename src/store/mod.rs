//! Record stores backed by memory or a JSON file.
//!
//! File layout:
//!
//! ```json
//! { "tables": { "<table>": { "<record>": { "Notes": "...", "Files": [ { "id": "...", "filename": "...", "url": "..." } ] } } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::{Attachment, RecordId, RecordRef, RecordStore, StoreError, TableId};

type Fields = BTreeMap<String, Value>;

/// All tables and records of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub tables: BTreeMap<TableId, BTreeMap<RecordId, Fields>>,
}

impl StoreData {
    /// Insert or replace a record's field.
    pub fn set(&mut self, record: &RecordRef, field: &str, value: Value) {
        self.tables
            .entry(record.table.clone())
            .or_default()
            .entry(record.record.clone())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn fields(&self, record: &RecordRef) -> Result<&Fields, StoreError> {
        self.tables
            .get(&record.table)
            .ok_or_else(|| StoreError::UnknownTable(record.table.clone()))?
            .get(&record.record)
            .ok_or_else(|| StoreError::UnknownRecord(record.clone()))
    }

    fn fields_mut(&mut self, record: &RecordRef) -> Result<&mut Fields, StoreError> {
        self.tables
            .get_mut(&record.table)
            .ok_or_else(|| StoreError::UnknownTable(record.table.clone()))?
            .get_mut(&record.record)
            .ok_or_else(|| StoreError::UnknownRecord(record.clone()))
    }

    fn text(&self, record: &RecordRef, field: &str) -> Result<Option<String>, StoreError> {
        match self.fields(record)?.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::FieldType {
                record: record.clone(),
                field: field.to_string(),
                expected: "text",
            }),
        }
    }

    fn write_text(&mut self, record: &RecordRef, field: &str, text: &str) -> Result<(), StoreError> {
        self.fields_mut(record)?
            .insert(field.to_string(), Value::String(text.to_string()));
        Ok(())
    }

    fn attachment_list(&self, record: &RecordRef, field: &str) -> Result<Vec<Attachment>, StoreError> {
        match self.fields(record)?.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => {
                Vec::<Attachment>::deserialize(value).map_err(|_| StoreError::FieldType {
                    record: record.clone(),
                    field: field.to_string(),
                    expected: "attachments",
                })
            }
        }
    }
}

/// A store that lives only in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: StoreData,
    writes: usize,
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        Self { data, writes: 0 }
    }

    pub const fn data(&self) -> &StoreData {
        &self.data
    }

    /// Number of successful field updates.
    pub const fn write_count(&self) -> usize {
        self.writes
    }
}

impl RecordStore for MemoryStore {
    fn get_field(&self, record: &RecordRef, field: &str) -> Result<Option<String>, StoreError> {
        self.data.text(record, field)
    }

    fn update_field(
        &mut self,
        record: &RecordRef,
        field: &str,
        markdown: &str,
    ) -> Result<(), StoreError> {
        self.data.write_text(record, field, markdown)?;
        self.writes += 1;
        Ok(())
    }

    fn attachments(&self, record: &RecordRef, field: &str) -> Result<Vec<Attachment>, StoreError> {
        self.data.attachment_list(record, field)
    }

    fn attachment_display_url(
        &self,
        _record: &RecordRef,
        _attachment_id: &str,
        url: &str,
    ) -> String {
        url.to_string()
    }
}

/// A store persisted to a JSON file after every update.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: StoreData,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            StoreData::default()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn data(&self) -> &StoreData {
        &self.data
    }

    /// Write the current data to disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        // Replace atomically; readers never see a partial file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, format!("{json}\n"))?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn get_field(&self, record: &RecordRef, field: &str) -> Result<Option<String>, StoreError> {
        self.data.text(record, field)
    }

    fn update_field(
        &mut self,
        record: &RecordRef,
        field: &str,
        markdown: &str,
    ) -> Result<(), StoreError> {
        let previous = self.data.text(record, field)?;
        self.data.write_text(record, field, markdown)?;
        if let Err(err) = self.save() {
            // Roll back to what is on disk.
            let restored = previous.map_or(Value::Null, Value::String);
            self.data.set(record, field, restored);
            return Err(err);
        }
        Ok(())
    }

    fn attachments(&self, record: &RecordRef, field: &str) -> Result<Vec<Attachment>, StoreError> {
        self.data.attachment_list(record, field)
    }

    fn attachment_display_url(
        &self,
        _record: &RecordRef,
        _attachment_id: &str,
        url: &str,
    ) -> String {
        url.to_string()
    }
}
