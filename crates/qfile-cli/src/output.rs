//! Output formatting helpers for the CLI.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use qfile_core::EncryptedFile;

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Table of encrypted files, newest first.
pub fn files_table(files: &[EncryptedFile]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "NAME", "RECIPIENT", "SIZE", "CREATED"]);
    for file in files {
        table.add_row(vec![
            file.unique_filename.clone(),
            file.original_name.clone(),
            file.recipient_id.clone(),
            format_size(file.size_bytes),
            file.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table
}

/// Convert file records to JSON for output.
pub fn files_json(files: &[EncryptedFile]) -> serde_json::Value {
    serde_json::Value::Array(
        files
            .iter()
            .map(|file| {
                serde_json::json!({
                    "id": file.unique_filename,
                    "original_name": file.original_name,
                    "owner": file.owner_username,
                    "recipient": file.recipient_id,
                    "size_bytes": file.size_bytes,
                    "created_at": file.created_at,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record() -> EncryptedFile {
        EncryptedFile {
            unique_filename: "abc123".to_string(),
            original_name: "report.pdf".to_string(),
            owner_username: "alice".to_string(),
            recipient_id: "alice".to_string(),
            storage_path: "abc123.enc".to_string(),
            size_bytes: 10 * 1024 * 1024,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MiB");
    }

    #[test]
    fn test_files_json_shape() {
        let value = files_json(&[record()]);
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["id"], "abc123");
        assert_eq!(first["original_name"], "report.pdf");
        assert_eq!(first["size_bytes"], 10 * 1024 * 1024);
        assert!(first.get("storage_path").is_none());
    }

    #[test]
    fn test_files_table_has_row_per_file() {
        let rendered = files_table(&[record()]).to_string();
        assert!(rendered.contains("report.pdf"));
        assert!(rendered.contains("10.0 MiB"));
    }
}
