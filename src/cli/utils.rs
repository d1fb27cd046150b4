use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": true, "message": message });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// JSON: the rows under `collection_name`. Text: a fixed-width table.
pub fn output_table<T: Serialize>(
    output_format: OutputFormat,
    collection_name: &str,
    rows: &[T],
    columns: &[(&str, usize)],
    cells: impl Fn(&T) -> Vec<String>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: rows }))?);
        }
        OutputFormat::Text => {
            println!("{}", format_row(columns, columns.iter().map(|(name, _)| name.to_string()).collect()));
            println!("{}", "-".repeat(columns.iter().map(|(_, width)| width + 1).sum()));
            for row in rows {
                println!("{}", format_row(columns, cells(row)));
            }
        }
    }
    Ok(())
}

fn format_row(columns: &[(&str, usize)], cells: Vec<String>) -> String {
    columns
        .iter()
        .zip(cells)
        .map(|((_, width), cell)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_column_width() {
        let columns = [("NAME", 6), ("ACTIVE", 6)];
        assert_eq!(format_row(&columns, vec!["acme".into(), "yes".into()]), "acme   yes");
    }
}
