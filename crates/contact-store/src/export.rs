use crate::error::{Result, StoreError};
use crate::snapshot::{write_snapshot, Snapshot};
use crate::types::ContactRecord;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CSV_HEADER: &str = "ID,Phone Number,LinkedID,Display Name,Source,Last Seen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(StoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Render records as delimited text. Every field is quoted; the header and rows are
/// newline-separated with no trailing newline.
pub fn to_csv<'a>(records: impl IntoIterator<Item = &'a ContactRecord>) -> String {
    let rows = records
        .into_iter()
        .map(|record| {
            let last_seen = record.last_seen.to_string();
            [
                record.id.as_str(),
                record.phone_number.as_deref().unwrap_or_default(),
                record.linked_id.as_deref().unwrap_or_default(),
                record.display_name.as_deref().unwrap_or_default(),
                record.source.as_str(),
                last_seen.as_str(),
            ]
            .iter()
            .map(|field| quote(field))
            .collect::<Vec<_>>()
            .join(",")
        });

    std::iter::once(CSV_HEADER.to_string())
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Where an export lands: `file_name` (or `contacts-export-<now>.<ext>`) next to the snapshot.
pub fn export_path(
    snapshot_path: &Path,
    format: ExportFormat,
    file_name: Option<&str>,
    now: u64,
) -> PathBuf {
    let dir = snapshot_path.parent().unwrap_or_else(|| Path::new(""));
    match file_name {
        Some(name) => dir.join(name),
        None => dir.join(format!("contacts-export-{now}.{}", format.extension())),
    }
}

pub async fn write_export(path: &Path, format: ExportFormat, snapshot: &Snapshot) -> Result<()> {
    match format {
        ExportFormat::Json => write_snapshot(path, snapshot).await,
        ExportFormat::Csv => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(path, to_csv(&snapshot.records)).await?;
            log::info!(
                "Exported {} contacts as CSV to {}",
                snapshot.records.len(),
                path.display()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContactSource;
    use pretty_assertions::assert_eq;

    fn record(id: &str, name: Option<&str>) -> ContactRecord {
        ContactRecord {
            id: id.to_string(),
            phone_number: Some("628111".to_string()),
            linked_id: None,
            display_name: name.map(str::to_string),
            source: ContactSource::ContactEvent,
            origin_group: None,
            origin_chat: None,
            last_seen: 1700,
        }
    }

    #[test]
    fn csv_quotes_every_field_and_doubles_quotes() {
        let records = [
            record("628111@s.whatsapp.net", Some("Ann \"The Boss\", Jr")),
            record("628222@s.whatsapp.net", None),
        ];
        let csv = to_csv(&records);
        assert_eq!(
            csv,
            "ID,Phone Number,LinkedID,Display Name,Source,Last Seen\n\
             \"628111@s.whatsapp.net\",\"628111\",\"\",\"Ann \"\"The Boss\"\", Jr\",\"ContactEvent\",\"1700\"\n\
             \"628222@s.whatsapp.net\",\"628111\",\"\",\"\",\"ContactEvent\",\"1700\""
        );
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(to_csv(std::iter::empty()), CSV_HEADER);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(" json ".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(StoreError::UnsupportedFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn export_lands_beside_snapshot() {
        let snapshot = Path::new("data/contacts.json");
        assert_eq!(
            export_path(snapshot, ExportFormat::Csv, None, 42),
            PathBuf::from("data/contacts-export-42.csv")
        );
        assert_eq!(
            export_path(snapshot, ExportFormat::Json, Some("mine.json"), 42),
            PathBuf::from("data/mine.json")
        );
    }
}
