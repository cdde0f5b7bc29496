// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! JSON lines codec: one object per row.

use crate::errors::TableError;
use crate::table::{Row, Table};
use serde_json::Value;

pub fn encode(table: &Table) -> Result<Vec<u8>, TableError> {
    let mut out = Vec::new();
    for row in table.rows() {
        let ordered: Row = table
            .columns()
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect();
        serde_json::to_writer(&mut out, &Value::Object(ordered))?;
        out.push(b'\n');
    }
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Table, TableError> {
    let mut table = Table::new();
    for line in bytes.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let row: Row = serde_json::from_slice(line)?;
        table.push(row);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn test_lines_follow_column_order() {
        let table = Table::from_rows(vec![
            row! {"id" => "a", "degree" => 2},
            row! {"id" => "b", "degree" => 0, "extra" => true},
        ]);
        let text = String::from_utf8(encode(&table).unwrap()).unwrap();
        assert_eq!(
            text,
            "{\"id\":\"a\",\"degree\":2}\n{\"id\":\"b\",\"degree\":0,\"extra\":true}\n"
        );
        assert_eq!(decode(text.as_bytes()).unwrap(), table);
    }

    #[test]
    fn test_decode_skips_blank_lines_and_rejects_garbage() {
        assert_eq!(decode(b"\n{\"a\":1}\n\n").unwrap().len(), 1);
        assert!(matches!(decode(b"not json"), Err(TableError::Json(_))));
    }
}
