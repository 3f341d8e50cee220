use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::SourceError;
use crate::time::normalize_timestamp;

/// One raw source document with its native id attached. The walker performs
/// no transformation beyond splitting the id off the field map.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Read boundary over the document store. `path` is the collection name,
/// optionally followed by parent-id / sub-collection segments, e.g.
/// `["channels"]` or `["channels", "c1", "messages"]`.
pub trait DocumentSource {
    fn documents(&self, path: &[&str]) -> Result<Vec<Document>, SourceError>;
}

/// Filesystem-backed source reading a JSONL export tree:
///
/// ```text
/// <root>/<collection>.jsonl
/// <root>/<collection>/<parent_id>/<subcollection>.jsonl
/// ```
///
/// One JSON object per line, each carrying its document `id`. A missing file
/// is an empty collection; anything else unreadable is a collection-level
/// error for the caller to isolate.
#[derive(Debug, Clone)]
pub struct ExportDirSource {
    root: PathBuf,
}

impl ExportDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_file(&self, path: &[&str]) -> PathBuf {
        let mut file = self.root.clone();
        for segment in &path[..path.len() - 1] {
            file.push(segment);
        }
        file.push(format!("{}.jsonl", path[path.len() - 1]));
        file
    }
}

impl DocumentSource for ExportDirSource {
    fn documents(&self, path: &[&str]) -> Result<Vec<Document>, SourceError> {
        assert!(!path.is_empty(), "collection path must not be empty");
        let file_path = self.collection_file(path);
        let file = match File::open(&file_path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(SourceError::Io {
                    path: file_path.display().to_string(),
                    source: err,
                })
            }
        };

        let reader = BufReader::new(file);
        let mut docs = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| SourceError::Io {
                path: file_path.display().to_string(),
                source: err,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: Value =
                serde_json::from_str(trimmed).map_err(|err| SourceError::Parse {
                    path: file_path.display().to_string(),
                    source: err,
                })?;
            docs.push(split_document(value, &file_path, index + 1)?);
        }

        sort_by_creation(&mut docs);
        Ok(docs)
    }
}

fn split_document(value: Value, path: &Path, line: usize) -> Result<Document, SourceError> {
    let Value::Object(mut fields) = value else {
        return Err(SourceError::MissingId {
            path: path.display().to_string(),
            line,
        });
    };
    let id = match fields.remove("id") {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(SourceError::MissingId {
                path: path.display().to_string(),
                line,
            })
        }
    };
    Ok(Document { id, fields })
}

/// Ascending creation order when `createdAt` is present, so run logs come
/// out deterministic. Documents without a usable timestamp keep their file
/// order at the end (the sort is stable).
fn sort_by_creation(docs: &mut [Document]) {
    docs.sort_by(|a, b| match (creation_key(a), creation_key(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

fn creation_key(doc: &Document) -> Option<String> {
    let created = doc.field("createdAt")?;
    match normalize_timestamp(created) {
        Value::String(s) => Some(s),
        // Epoch numbers sort correctly when zero-padded to a fixed width.
        Value::Number(n) => n.as_i64().map(|v| format!("{v:020}")),
        _ => None,
    }
}
