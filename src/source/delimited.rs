//! Delimited-file row source

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::error::SourceReadError;
use super::record::{Record, Value};

/// Options for reading delimited input
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Lazy, single-pass reader over a delimited file with a header row
///
/// Every cell is produced as [`Value::Text`] (or [`Value::Null`] when empty);
/// typing is the schema validator's job.
pub struct CsvRowSource<R: Read = File> {
    name: String,
    reader: csv::Reader<R>,
    columns: Arc<[String]>,
    next_index: usize,
    content_hash: Option<String>,
    finished: bool,
}

impl CsvRowSource<File> {
    /// Open a file and read its header row
    pub fn open(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self, SourceReadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SourceReadError::NotFound(path.to_path_buf()));
        }

        let content_hash = hash_file(path)?;
        let file = File::open(path)?;
        let mut source = Self::from_reader(file, path.display().to_string(), options)?;
        source.content_hash = Some(content_hash);

        debug!(
            input = %path.display(),
            columns = source.columns.len(),
            "Opened row source"
        );
        Ok(source)
    }
}

impl<R: Read> CsvRowSource<R> {
    /// Read from any byte stream; `name` identifies it in errors
    pub fn from_reader(
        reader: R,
        name: impl Into<String>,
        options: CsvOptions,
    ) -> Result<Self, SourceReadError> {
        let name = name.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| SourceReadError::Unreadable {
                input: name.clone(),
                reason: e.to_string(),
            })?
            .clone();

        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(SourceReadError::Empty(name));
        }

        let mut seen = HashSet::new();
        for header in headers.iter() {
            if header.is_empty() {
                return Err(SourceReadError::Malformed {
                    input: name,
                    reason: "header row contains an unnamed column".to_string(),
                });
            }
            if !seen.insert(header) {
                return Err(SourceReadError::Malformed {
                    input: name,
                    reason: format!("duplicate column '{header}'"),
                });
            }
        }

        let columns: Arc<[String]> = headers.iter().map(str::to_string).collect();

        Ok(Self {
            name,
            reader,
            columns,
            next_index: 1,
            content_hash: None,
            finished: false,
        })
    }

    /// Ordered input column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Identifier of the input used in errors and logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SHA-256 of the input file, when read from a path
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }
}

impl<R: Read> Iterator for CsvRowSource<R> {
    type Item = Result<Record, SourceReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut raw = csv::StringRecord::new();
        let row = self.next_index;
        match self.reader.read_record(&mut raw) {
            Ok(false) => {
                self.finished = true;
                None
            }
            Ok(true) => {
                self.next_index += 1;
                let values = raw
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            Value::Null
                        } else {
                            Value::Text(cell.to_string())
                        }
                    })
                    .collect();
                Some(Ok(Record::new(row, Arc::clone(&self.columns), values)))
            }
            Err(e) => match e.kind() {
                csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. } => {
                    self.next_index += 1;
                    Some(Err(SourceReadError::MalformedRecord {
                        row,
                        reason: e.to_string(),
                    }))
                }
                _ => {
                    self.finished = true;
                    Some(Err(SourceReadError::Unreadable {
                        input: self.name.clone(),
                        reason: e.to_string(),
                    }))
                }
            },
        }
    }
}

/// Compute the SHA-256 digest of a file
pub fn hash_file(path: &Path) -> Result<String, SourceReadError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source(text: &str) -> Result<CsvRowSource<&[u8]>, SourceReadError> {
        CsvRowSource::from_reader(text.as_bytes(), "inline", CsvOptions::default())
    }

    #[test]
    fn test_reads_header_and_records() {
        let mut src = source("id,amount,status\n1,10.50,ok\n2,,pending\n").unwrap();
        assert_eq!(src.columns(), ["id", "amount", "status"]);

        let first = src.next().unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.get("amount").and_then(Value::as_text), Some("10.50"));

        let second = src.next().unwrap().unwrap();
        assert_eq!(second.index, 2);
        assert_eq!(second.get("amount"), Some(&Value::Null));

        assert!(src.next().is_none());
        assert!(src.next().is_none());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(source(""), Err(SourceReadError::Empty(_))));
    }

    #[test]
    fn test_duplicate_header_is_rejected() {
        let err = source("id,id\n1,2\n").err().unwrap();
        assert!(matches!(err, SourceReadError::Malformed { .. }));
    }

    #[test]
    fn test_short_record_is_row_local() {
        let mut src = source("id,status\n1,ok\n2\n3,ok\n").unwrap();
        assert!(src.next().unwrap().is_ok());

        let err = src.next().unwrap().unwrap_err();
        assert!(err.is_row_local());
        assert!(matches!(err, SourceReadError::MalformedRecord { row: 2, .. }));

        let third = src.next().unwrap().unwrap();
        assert_eq!(third.index, 3);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut src = CsvRowSource::from_reader(
            "id;name\n1; alpha \n".as_bytes(),
            "inline",
            CsvOptions { delimiter: b';' },
        )
        .unwrap();
        let record = src.next().unwrap().unwrap();
        assert_eq!(record.get("name").and_then(Value::as_text), Some("alpha"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = CsvRowSource::open("/definitely/not/here.csv", CsvOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, SourceReadError::NotFound(_)));
        assert!(err.user_message().contains("Hint:"));
    }

    #[test]
    fn test_open_computes_content_hash() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id\n1").unwrap();

        let src = CsvRowSource::open(file.path(), CsvOptions::default()).unwrap();
        let hash = src.content_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_file(file.path()).unwrap());
    }
}
