use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read + Send>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let file: Box<dyn Read + Send> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::with_capacity(256 * 1024, file))
}

/// Get a reader for either a gzipped, non-gzipped file, or stdin
///
/// # Arguments
///
/// - file_path_str: path to the file to read, or '-' for stdin
pub fn get_dynamic_reader_w_stdin(file_path_str: &str) -> Result<BufReader<Box<dyn Read + Send>>> {
    if file_path_str == "-" {
        Ok(BufReader::new(Box::new(std::io::stdin()) as Box<dyn Read + Send>))
    } else {
        get_dynamic_reader(Path::new(file_path_str))
    }
}

///
/// Read a two-column, tab separated lookup file into `(key, value)` pairs.
/// Blank lines and lines starting with `#` are skipped, as are lines with a
/// single column.
///
pub fn read_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let reader = get_dynamic_reader(path)?;
    let mut pairs = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed reading {:?}", path))?;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('\t') {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    Ok(pairs)
}

/// Split a `|` separated multi-value cell, dropping empty entries.
pub fn split_multi(cell: &str) -> Vec<String> {
    cell.split('|')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_read_pairs_plain_and_gz() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("pairs.tsv");
        std::fs::write(&plain, "# comment\na\t1\n\nb\t2|3\nlonely\n").unwrap();
        let pairs = read_pairs(&plain).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2|3".to_string())
            ]
        );

        let gz = dir.path().join("pairs.tsv.gz");
        let mut encoder = GzEncoder::new(std::fs::File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"x\ty\n").unwrap();
        encoder.finish().unwrap();
        assert_eq!(read_pairs(&gz).unwrap(), vec![("x".to_string(), "y".to_string())]);
    }

    #[test]
    fn test_split_multi() {
        assert_eq!(split_multi("a| b ||c"), vec!["a", "b", "c"]);
        assert!(split_multi("").is_empty());
    }
}
