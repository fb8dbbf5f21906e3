use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, IoContext, Result};
use crate::index::{Posting, TermPostings, TermPostingsRef};
use crate::M1Analytics;

const PARTIAL_PREFIX: &str = "partial-";
const PARTIAL_EXT: &str = "bin";

/// Canonical file layout under an output root.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn partials_dir(&self) -> PathBuf { self.root.join("partials") }
    pub fn final_dir(&self) -> PathBuf { self.root.join("final") }
    pub fn meta_dir(&self) -> PathBuf { self.root.join("meta") }
    pub fn postings(&self) -> PathBuf { self.final_dir().join("index.postings") }
    pub fn lexicon(&self) -> PathBuf { self.final_dir().join("index.lexicon") }
    pub fn doc_table(&self) -> PathBuf { self.meta_dir().join("doc_table.jsonl") }
    pub fn analytics(&self) -> PathBuf { self.meta_dir().join("analytics.json") }
    pub fn analytics_md(&self) -> PathBuf { self.meta_dir().join("analytics.md") }
    pub fn partial(&self, partial_id: u32) -> PathBuf {
        self.partials_dir().join(format!("{PARTIAL_PREFIX}{partial_id:06}.{PARTIAL_EXT}"))
    }
}

/// Create the output folders, drop partials from a previous run and start
/// empty final postings, lexicon and doc table files.
pub fn prepare_output_layout(paths: &IndexPaths) -> Result<()> {
    let partials = paths.partials_dir();
    if partials.exists() {
        fs::remove_dir_all(&partials).with_path(&partials)?;
    }
    for dir in [partials, paths.final_dir(), paths.meta_dir()] {
        create_dir_all(&dir).with_path(&dir)?;
    }
    for file in [paths.postings(), paths.lexicon(), paths.doc_table()] {
        File::create(&file).with_path(&file)?;
    }
    let analytics = paths.analytics();
    if analytics.exists() {
        fs::remove_file(&analytics).with_path(&analytics)?;
    }
    Ok(())
}

/// Append-only writer of length-prefixed bincode records.
pub struct RecordWriter {
    path: PathBuf,
    inner: BufWriter<File>,
    offset: u64,
}

impl RecordWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).with_path(&path)?;
        Ok(Self { inner: BufWriter::new(file), path, offset: 0 })
    }

    /// Write one record and return the byte offset it starts at.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<u64> {
        let payload = bincode::serialize(record)
            .map_err(|e| IndexError::Encode { path: self.path.clone(), reason: e.to_string() })?;
        let len = u32::try_from(payload.len())
            .map_err(|_| IndexError::RecordTooLarge { path: self.path.clone(), len: payload.len() })?;
        let start = self.offset;
        self.inner.write_all(&len.to_le_bytes()).with_path(&self.path)?;
        self.inner.write_all(&payload).with_path(&self.path)?;
        self.offset += 4 + payload.len() as u64;
        Ok(start)
    }

    pub fn offset(&self) -> u64 { self.offset }

    /// Flush and sync; returns the total bytes written.
    pub fn finish(mut self) -> Result<u64> {
        self.inner.flush().with_path(&self.path)?;
        self.inner.get_ref().sync_all().with_path(&self.path)?;
        Ok(self.offset)
    }
}

/// Forward-only scanner over a file written by [`RecordWriter`].
pub struct RecordReader {
    path: PathBuf,
    inner: BufReader<File>,
    offset: u64,
    file_len: u64,
}

impl RecordReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_at(path, 0)
    }

    pub fn open_at<P: AsRef<Path>>(path: P, offset: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).with_path(&path)?;
        let file_len = file.metadata().with_path(&path)?.len();
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).with_path(&path)?;
        }
        Ok(Self { inner: BufReader::new(file), path, offset, file_len })
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Offset of the next record to be read.
    pub fn offset(&self) -> u64 { self.offset }

    /// Next `(offset, record)`, or `None` at a clean end of file.
    pub fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<(u64, T)>> {
        let start = self.offset;
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            match self.inner.read(&mut len_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).with_path(&self.path),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < len_buf.len() {
            return Err(self.corrupt(start, format!("truncated length prefix ({filled} of 4 bytes)")));
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let remaining = self.file_len.saturating_sub(start + 4);
        if len as u64 > remaining {
            return Err(self.corrupt(start, format!("length prefix {len} exceeds the {remaining} bytes left")));
        }
        let mut payload = vec![0u8; len];
        if let Err(e) = self.inner.read_exact(&mut payload) {
            return Err(match e.kind() {
                ErrorKind::UnexpectedEof => self.corrupt(start, format!("truncated payload, expected {len} bytes")),
                _ => IndexError::Io { path: self.path.clone(), source: e },
            });
        }
        let record = bincode::deserialize(&payload).map_err(|e| self.corrupt(start, e.to_string()))?;
        self.offset += 4 + len as u64;
        Ok(Some((start, record)))
    }

    fn corrupt(&self, offset: u64, reason: String) -> IndexError {
        IndexError::CorruptRecord { path: self.path.clone(), offset, reason }
    }
}

/// Persist one term-sorted partial index. The file only appears under its
/// final name once every record is on disk.
pub fn write_partial_index(paths: &IndexPaths, partial_id: u32, sorted: &[(&String, &Vec<Posting>)]) -> Result<PathBuf> {
    let target = paths.partial(partial_id);
    let tmp = target.with_extension(format!("{PARTIAL_EXT}.tmp"));
    let mut writer = RecordWriter::create(&tmp)?;
    for (term, postings) in sorted {
        writer.append(&TermPostingsRef { term: term.as_str(), postings: postings.as_slice() })?;
    }
    writer.finish()?;
    fs::rename(&tmp, &target).with_path(&target)?;
    Ok(target)
}

fn partial_id_of(path: &Path) -> Option<u32> {
    if path.extension().and_then(|s| s.to_str()) != Some(PARTIAL_EXT) {
        return None;
    }
    path.file_stem()?.to_str()?.strip_prefix(PARTIAL_PREFIX)?.parse().ok()
}

/// All finished partial files, ordered by partial sequence id.
pub fn list_partial_indexes(paths: &IndexPaths) -> Result<Vec<PathBuf>> {
    let dir = paths.partials_dir();
    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&dir).with_path(&dir)? {
        let p = entry.with_path(&dir)?.path();
        if let Some(id) = partial_id_of(&p) {
            found.push((id, p));
        }
    }
    found.sort_by_key(|(id, _)| *id);
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

/// Line-per-record JSON writer used for the lexicon and doc table.
pub struct JsonlWriter {
    path: PathBuf,
    inner: BufWriter<File>,
}

impl JsonlWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).with_path(&path)?;
        Ok(Self { inner: BufWriter::new(file), path })
    }

    pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).with_path(&path)?;
        Ok(Self { inner: BufWriter::new(file), path })
    }

    pub fn append<T: Serialize>(&mut self, row: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, row)
            .map_err(|e| IndexError::Encode { path: self.path.clone(), reason: e.to_string() })?;
        self.inner.write_all(b"\n").with_path(&self.path)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().with_path(&self.path)
    }

    pub fn finish(mut self) -> Result<()> {
        self.flush()?;
        self.inner.get_ref().sync_all().with_path(&self.path)
    }
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(IndexError::MissingArtifact(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path).with_path(path)?);
    let mut rows = Vec::new();
    let mut offset = 0u64;
    for line in reader.lines() {
        let line = line.with_path(path)?;
        let line_len = line.len() as u64 + 1;
        if !line.trim().is_empty() {
            let row = serde_json::from_str(&line).map_err(|e| IndexError::CorruptRecord {
                path: path.to_path_buf(),
                offset,
                reason: e.to_string(),
            })?;
            rows.push(row);
        }
        offset += line_len;
    }
    Ok(rows)
}

/// Number of non-blank lines, without decoding them.
pub fn count_jsonl_rows(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(IndexError::MissingArtifact(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path).with_path(path)?);
    let mut count = 0;
    for line in reader.lines() {
        if !line.with_path(path)?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub term: String,
    pub offset: u64,
}

pub fn load_lexicon(paths: &IndexPaths) -> Result<Vec<LexiconEntry>> {
    read_jsonl(&paths.lexicon())
}

/// Read the single final postings record starting at `offset`.
pub fn read_postings_at(paths: &IndexPaths, offset: u64) -> Result<TermPostings> {
    let postings = paths.postings();
    let mut reader = RecordReader::open_at(&postings, offset)?;
    match reader.next_record()? {
        Some((_, record)) => Ok(record),
        None => Err(IndexError::CorruptRecord {
            path: postings,
            offset,
            reason: "offset is past the end of the postings file".into(),
        }),
    }
}

/// Look a term up in the lexicon and read only its postings.
pub fn read_postings_for_term(paths: &IndexPaths, term: &str) -> Result<Option<Vec<Posting>>> {
    let lexicon = load_lexicon(paths)?;
    match lexicon.binary_search_by(|e| e.term.as_str().cmp(term)) {
        Ok(i) => Ok(Some(read_postings_at(paths, lexicon[i].offset)?.postings)),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsFile {
    #[serde(flatten)]
    pub analytics: M1Analytics,
    pub generated_at: String,
}

pub fn save_analytics(paths: &IndexPaths, file: &AnalyticsFile) -> Result<()> {
    let meta = paths.meta_dir();
    create_dir_all(&meta).with_path(&meta)?;
    let path = paths.analytics();
    let json = serde_json::to_string_pretty(file)
        .map_err(|e| IndexError::Encode { path: path.clone(), reason: e.to_string() })?;
    fs::write(&path, json).with_path(&path)
}

pub fn load_analytics(paths: &IndexPaths) -> Result<AnalyticsFile> {
    let path = paths.analytics();
    if !path.exists() {
        return Err(IndexError::MissingArtifact(path));
    }
    let buf = fs::read_to_string(&path).with_path(&path)?;
    serde_json::from_str(&buf).map_err(|e| IndexError::CorruptRecord { path, offset: 0, reason: e.to_string() })
}
