use crate::error::{ReaderError, RowError};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub delimiter: u8,
    /// Honor double quotes as field quoting and keep stray quotes inside
    /// unquoted fields as literal text. When false, quotes carry no meaning.
    pub lenient_quoting: bool,
    /// Accept rows whose cell count differs from the header.
    pub flexible: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            lenient_quoting: true,
            flexible: false,
        }
    }
}

/// Normalized header name → column index. Duplicate names: last wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    pub fn from_record(record: &StringRecord) -> Self {
        let mut columns = HashMap::with_capacity(record.len());
        for (index, name) in record.iter().enumerate() {
            columns.insert(normalize_header(name), index);
        }
        Self {
            columns,
            width: record.len(),
        }
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_record(&names.into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Number of cells in the header line.
    pub fn width(&self) -> usize {
        self.width
    }
}

fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// One data line of a delimited file.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: u64,
    pub cells: StringRecord,
}

impl RawRow {
    pub fn new(line: u64, cells: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let mut record = StringRecord::new();
        for cell in cells {
            record.push_field(cell.as_ref());
        }
        Self {
            line,
            cells: record,
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Streaming reader over one delimited file.
///
/// Yields `Ok(RawRow)` for every well-formed line and `Err(RowError)` for
/// lines that must be skipped. An I/O failure is yielded once and ends the
/// stream. Not restartable: open the file again to start over.
pub struct DelimitedReader {
    path: PathBuf,
    inner: csv::Reader<File>,
    header: HeaderIndex,
    last_line: u64,
    finished: bool,
}

impl std::fmt::Debug for DelimitedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelimitedReader")
            .field("path", &self.path)
            .field("last_line", &self.last_line)
            .field("finished", &self.finished)
            .finish()
    }
}

impl DelimitedReader {
    pub fn open(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self, ReaderError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ReaderError::NotFound(path.clone()),
            _ => ReaderError::Io {
                path: path.clone(),
                source,
            },
        })?;

        let mut inner = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quoting(options.lenient_quoting)
            .flexible(options.flexible)
            .has_headers(false)
            .from_reader(file);

        let mut first = StringRecord::new();
        let has_header = inner
            .read_record(&mut first)
            .map_err(|source| ReaderError::Header {
                path: path.clone(),
                source,
            })?;
        if !has_header {
            return Err(ReaderError::EmptyFile(path));
        }

        let last_line = first.position().map(|p| p.line()).unwrap_or(1);
        Ok(Self {
            header: HeaderIndex::from_record(&first),
            path,
            inner,
            last_line,
            finished: false,
        })
    }

    pub fn header(&self) -> &HeaderIndex {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for DelimitedReader {
    type Item = Result<RawRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut record = StringRecord::new();
        match self.inner.read_record(&mut record) {
            Ok(true) => {
                let line = record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.last_line + 1);
                self.last_line = line;
                Some(Ok(RawRow {
                    line,
                    cells: record,
                }))
            }
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.last_line + 1);
                self.last_line = line;
                let reason = err.to_string();
                match err.into_kind() {
                    csv::ErrorKind::Io(source) => {
                        self.finished = true;
                        Some(Err(RowError::Io { line, source }))
                    }
                    _ => Some(Err(RowError::Malformed { line, reason })),
                }
            }
        }
    }
}
