//! CSV ingestion for the CLI.
//!
//! Rows are `id,f1,...,f_dim` (vectors) or `f1,...,f_dim` (queries), with an
//! optional single trailing metadata column in the `key=value;...` syntax.
//! Quoted fields are RFC4180-ish (`""` escapes a quote), a UTF-8 BOM on the
//! first line is stripped, blank lines and `#` comment lines are skipped.
//! The engine never parses CSV itself; this module feeds it through the
//! Collection API.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Row-shape options for a CSV source.
#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    /// Skip the first non-blank row.
    pub has_header: bool,
    /// The first column is always an id.
    pub has_id: bool,
    /// Treat the first column as an id when it does not parse as a float.
    pub infer_id: bool,
    /// Allow exactly one trailing metadata column.
    pub allow_metadata: bool,
}

/// One parsed CSV row.
#[derive(Debug, Clone, Default)]
pub struct CsvRow {
    pub id: Option<String>,
    pub vec: Vec<f32>,
    pub metadata_raw: Option<String>,
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Split one line into trimmed fields, honoring double-quoted cells.
fn split_quoted(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '"' => in_quotes = true,
                ',' => parts.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
    }
    parts.push(current);

    for part in &mut parts {
        *part = part.trim().to_string();
    }
    parts
}

/// Parse a single CSV line into a row.
///
/// With `dim_expected > 0` the vector column count is validated, and the
/// metadata column (when allowed) is recognized as exactly one extra column.
pub fn parse_line(line: &str, dim_expected: usize, opts: &CsvOptions) -> io::Result<CsvRow> {
    let parts = split_quoted(line);
    if parts.is_empty() {
        return Err(invalid_data("empty csv line".to_string()));
    }

    let mut row = CsvRow::default();
    let mut start = 0;
    if opts.has_id {
        row.id = Some(parts[0].clone());
        start = 1;
    } else if opts.infer_id && parts[0].parse::<f32>().is_err() {
        row.id = Some(parts[0].clone());
        start = 1;
    }

    if start >= parts.len() {
        return Err(invalid_data("no vector values found".to_string()));
    }

    let remaining = parts.len() - start;
    let mut has_meta = false;
    if opts.allow_metadata && dim_expected > 0 {
        if remaining == dim_expected + 1 {
            has_meta = true;
        } else if remaining > dim_expected + 1 {
            return Err(invalid_data(
                "too many columns (metadata expects exactly one extra column)".to_string(),
            ));
        }
    }

    let vec_count = remaining - usize::from(has_meta);
    if dim_expected > 0 && vec_count != dim_expected {
        return Err(invalid_data(format!(
            "dimension mismatch: expected dim={dim_expected} got dim={vec_count}"
        )));
    }

    row.vec.reserve(vec_count);
    for (column, part) in parts[start..start + vec_count].iter().enumerate() {
        let value: f32 = part.parse().map_err(|_| {
            invalid_data(format!(
                "failed to parse float at column {}: '{part}'",
                start + column + 1
            ))
        })?;
        row.vec.push(value);
    }

    if has_meta {
        row.metadata_raw = Some(parts[start + vec_count].clone());
    }

    Ok(row)
}

/// Stream rows from a CSV file into `callback`. Returning `Ok(false)` stops
/// iteration early. Errors carry the 1-based line number.
pub fn for_each_row<F>(
    path: &Path,
    dim_expected: usize,
    opts: &CsvOptions,
    mut callback: F,
) -> io::Result<()>
where
    F: FnMut(CsvRow) -> io::Result<bool>,
{
    let reader = BufReader::new(File::open(path)?);
    let mut header_skipped = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let mut text = line.as_str();
        if line_no == 0 {
            text = text.strip_prefix('\u{feff}').unwrap_or(text);
        }
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        if opts.has_header && !header_skipped {
            header_skipped = true;
            continue;
        }

        let row = parse_line(text, dim_expected, opts)
            .map_err(|e| invalid_data(format!("csv parse error at line {}: {e}", line_no + 1)))?;
        if !callback(row)? {
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn opts_id() -> CsvOptions {
        CsvOptions {
            has_id: true,
            ..CsvOptions::default()
        }
    }

    #[test]
    fn test_parse_with_id() {
        let row = parse_line("u1,1.0,2.0,3.0", 3, &opts_id()).unwrap();
        assert_eq!(row.id.as_deref(), Some("u1"));
        assert_eq!(row.vec, vec![1.0, 2.0, 3.0]);
        assert!(row.metadata_raw.is_none());
    }

    #[test]
    fn test_infer_id() {
        let opts = CsvOptions {
            infer_id: true,
            ..CsvOptions::default()
        };
        let named = parse_line("q7,1.0,2.0", 2, &opts).unwrap();
        assert_eq!(named.id.as_deref(), Some("q7"));
        let bare = parse_line("0.5,1.0", 2, &opts).unwrap();
        assert!(bare.id.is_none());
        assert_eq!(bare.vec, vec![0.5, 1.0]);
    }

    #[test]
    fn test_metadata_column() {
        let opts = CsvOptions {
            has_id: true,
            allow_metadata: true,
            ..CsvOptions::default()
        };
        let row = parse_line("u1,1.0,2.0,cluster=2", 2, &opts).unwrap();
        assert_eq!(row.metadata_raw.as_deref(), Some("cluster=2"));
        assert_eq!(row.vec, vec![1.0, 2.0]);

        // no metadata column is still fine
        let bare = parse_line("u1,1.0,2.0", 2, &opts).unwrap();
        assert!(bare.metadata_raw.is_none());

        // two extra columns are not
        assert!(parse_line("u1,1.0,2.0,a=1,b=2", 2, &opts).is_err());
    }

    #[test]
    fn test_quoted_fields() {
        let row = parse_line("\"id, with comma\",1.0,2.0", 2, &opts_id()).unwrap();
        assert_eq!(row.id.as_deref(), Some("id, with comma"));

        let quoted = parse_line("\"say \"\"hi\"\"\",1.0,2.0", 2, &opts_id()).unwrap();
        assert_eq!(quoted.id.as_deref(), Some("say \"hi\""));
    }

    #[test]
    fn test_dim_mismatch() {
        assert!(parse_line("u1,1.0", 2, &opts_id()).is_err());
        assert!(parse_line("u1,1.0,2.0,3.0", 2, &opts_id()).is_err());
    }

    #[test]
    fn test_bad_float() {
        let err = parse_line("u1,1.0,oops", 2, &opts_id()).unwrap_err();
        assert!(err.to_string().contains("column 3"));
    }

    #[test]
    fn test_for_each_row_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.csv");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            "\u{feff}id,x,y\n# comment\n\nu1,1.0,2.0\nu2,3.0,4.0\n"
        )
        .unwrap();

        let opts = CsvOptions {
            has_header: true,
            has_id: true,
            ..CsvOptions::default()
        };
        let mut seen = Vec::new();
        for_each_row(&path, 2, &opts, |row| {
            seen.push(row.id.unwrap());
            Ok(true)
        })
        .unwrap();
        assert_eq!(seen, vec!["u1", "u2"]);
    }

    #[test]
    fn test_for_each_row_early_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.csv");
        let mut file = File::create(&path).unwrap();
        write!(file, "u1,1.0,2.0\nu2,3.0,4.0\nu3,5.0,6.0\n").unwrap();

        let mut count = 0;
        for_each_row(&path, 2, &opts_id(), |_| {
            count += 1;
            Ok(count < 2)
        })
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_for_each_row_error_has_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.csv");
        let mut file = File::create(&path).unwrap();
        write!(file, "u1,1.0,2.0\nu2,broken,4.0\n").unwrap();

        let err = for_each_row(&path, 2, &opts_id(), |_| Ok(true)).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
