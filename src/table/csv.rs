// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! CSV codec. Strings are written as-is, nulls as empty cells and every
//! other value as its JSON text. Decoding yields string cells only.

use crate::errors::TableError;
use crate::table::{Row, Table};
use serde_json::Value;

pub fn encode(table: &Table) -> Result<Vec<u8>, TableError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        let record = table
            .columns()
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect::<Vec<_>>();
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| TableError::Csv(csv::Error::from(e.into_error())))
}

/// Reads a headed CSV document.
pub fn decode(bytes: &[u8]) -> Result<Table, TableError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let mut table = Table::with_columns(headers.clone());
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), Value::String(v.to_string())))
            .collect();
        table.push(row);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn test_encode_renders_non_strings_as_json() {
        let table = Table::from_rows(vec![
            row! {"id" => "a", "n" => 2, "tags" => ["x"], "note" => null},
            row! {"id" => "b,c", "n" => 3.5},
        ]);
        let text = String::from_utf8(encode(&table).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,n,tags,note");
        assert_eq!(lines[1], r#"a,2,"[""x""]","#);
        assert_eq!(lines[2], r#""b,c",3.5,,"#);
    }

    #[test]
    fn test_decode_reads_strings() {
        let table = decode(b"id,text\n1,hello\n2,\"a, b\"\n").unwrap();
        assert_eq!(table.columns(), &["id", "text"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.str_at(1, "text").unwrap(), "a, b");
    }
}
