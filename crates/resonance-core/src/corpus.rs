//! Training corpus writer
//!
//! The corpus is a JSON Lines file: one confirmed [`TrainingSample`] per
//! line, in append order. The writer is its only owner and only ever
//! appends. Each record is written with a single `write` on a descriptor
//! opened with `O_APPEND`, so concurrent writers (threads or processes)
//! never interleave or overwrite each other and no application lock is
//! needed.

use crate::error::StoreError;
use crate::parser::parse_value;
use crate::schema::{fields, AnalysisResult, Fragment, Triad};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A human-confirmed (triad, label) pair
///
/// Validated on construction; serializes to the persisted line layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSample {
    #[serde(flatten)]
    triad: Triad,
    label: AnalysisResult,
}

impl TrainingSample {
    /// Pair a triad with its reviewed label
    ///
    /// # Errors
    /// - `StoreError::IncompleteSample` if any fragment is blank
    pub fn new(triad: Triad, label: AnalysisResult) -> Result<Self, StoreError> {
        if let Some(field) = triad.first_blank() {
            return Err(StoreError::incomplete(format!("`{field}` is empty")));
        }
        Ok(Self { triad, label })
    }

    /// The annotated triad
    #[inline]
    #[must_use]
    pub fn triad(&self) -> &Triad {
        &self.triad
    }

    /// The confirmed label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &AnalysisResult {
        &self.label
    }

    /// Encode as one newline-terminated record
    ///
    /// # Errors
    /// - `StoreError::IncompleteSample` if the sample cannot be encoded
    pub fn to_line(&self) -> Result<Vec<u8>, StoreError> {
        let mut line = serde_json::to_vec(self)
            .map_err(|e| StoreError::incomplete(format!("sample cannot be encoded: {e}")))?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Loosely-typed save request, as received from an editor or HTTP body
///
/// Converted into a [`TrainingSample`] with `TryFrom`; nothing untyped
/// reaches the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleDraft {
    /// Text of fragment A
    #[serde(default)]
    pub fragment_a: Option<Value>,
    /// Text of fragment B
    #[serde(default)]
    pub fragment_b: Option<Value>,
    /// Text of fragment C
    #[serde(default)]
    pub fragment_c: Option<Value>,
    /// Label object, validated against the label schema
    #[serde(default)]
    pub label: Option<Value>,
}

impl SampleDraft {
    /// Draft from a triad and an edited label value
    #[must_use]
    pub fn new(triad: &Triad, label: Value) -> Self {
        Self {
            fragment_a: Some(triad.fragment_a().as_str().into()),
            fragment_b: Some(triad.fragment_b().as_str().into()),
            fragment_c: Some(triad.fragment_c().as_str().into()),
            label: Some(label),
        }
    }

    /// Decode a raw save request body
    ///
    /// # Errors
    /// - `StoreError::IncompleteSample` if the body is not a JSON object
    pub fn from_slice(body: &[u8]) -> Result<Self, StoreError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| StoreError::incomplete(format!("sample is not JSON: {e}")))?;
        if !value.is_object() {
            return Err(StoreError::incomplete("sample must be a JSON object"));
        }
        serde_json::from_value(value)
            .map_err(|e| StoreError::incomplete(format!("sample cannot be read: {e}")))
    }
}

impl TryFrom<SampleDraft> for TrainingSample {
    type Error = StoreError;

    fn try_from(draft: SampleDraft) -> Result<Self, Self::Error> {
        let fragment_a = required_fragment(draft.fragment_a, fields::FRAGMENT_A)?;
        let fragment_b = required_fragment(draft.fragment_b, fields::FRAGMENT_B)?;
        let fragment_c = required_fragment(draft.fragment_c, fields::FRAGMENT_C)?;

        let label = draft
            .label
            .filter(|value| !value.is_null())
            .ok_or_else(|| StoreError::incomplete(format!("`{}` is missing", fields::LABEL)))?;
        let label: AnalysisResult = parse_value(&label)
            .map_err(|e| StoreError::incomplete(format!("`{}` is invalid: {e}", fields::LABEL)))?;

        TrainingSample::new(Triad::new(fragment_a, fragment_b, fragment_c), label)
    }
}

fn required_fragment(value: Option<Value>, field: &'static str) -> Result<Fragment, StoreError> {
    let fragment = match value {
        None | Some(Value::Null) => {
            return Err(StoreError::incomplete(format!("`{field}` is missing")));
        }
        Some(Value::String(text)) => Fragment::new(text),
        Some(_) => return Err(StoreError::incomplete(format!("`{field}` must be a string"))),
    };
    if fragment.is_blank() {
        return Err(StoreError::incomplete(format!("`{field}` is empty")));
    }
    Ok(fragment)
}

/// Append-only writer for the training corpus
///
/// Cheap to clone; holds nothing but the store location.
#[derive(Debug, Clone)]
pub struct CorpusWriter {
    path: PathBuf,
}

impl CorpusWriter {
    /// Writer for the corpus file at `path`
    ///
    /// The file is created on first append; its directory must exist.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Corpus location
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate a draft and append it
    ///
    /// # Errors
    /// - `StoreError::IncompleteSample` if the draft fails validation (no write)
    /// - `StoreError::StoreUnavailable`, `PermissionDenied`, `DiskFull` on I/O failure
    #[tracing::instrument(name = "save_sample", skip_all, fields(path = %self.path.display()))]
    pub async fn save_sample(&self, draft: SampleDraft) -> Result<(), StoreError> {
        let sample = TrainingSample::try_from(draft).map_err(|e| {
            tracing::warn!(error = %e, "rejected training sample");
            e
        })?;
        self.append(&sample).await
    }

    /// Append an already validated sample
    ///
    /// # Errors
    /// - `StoreError::StoreUnavailable`, `PermissionDenied`, `DiskFull` on I/O failure
    pub async fn append(&self, sample: &TrainingSample) -> Result<(), StoreError> {
        let line = sample.to_line()?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| StoreError::from_io(&self.path, io::Error::other(e)))??;

        tracing::info!(
            resulting_type = %sample.label().resulting_type(),
            "appended training sample"
        );
        Ok(())
    }
}

/// Append one record with a single write, then flush it to disk
fn append_line(path: &Path, line: &[u8]) -> Result<(), StoreError> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| StoreError::from_io(path, e))?;

    write_record(&mut file, line).map_err(|e| StoreError::from_io(path, e))?;
    file.sync_data().map_err(|e| StoreError::from_io(path, e))
}

/// Issue the single write for `line`
///
/// A short write leaves a torn prefix behind; it is closed with a newline
/// (best effort) so the next record starts on a line of its own.
fn write_record<W: Write>(out: &mut W, line: &[u8]) -> io::Result<()> {
    // A split record could interleave with another writer's append
    let written = out.write(line)?;
    if written == line.len() {
        return Ok(());
    }

    if written > 0 && out.write_all(b"\n").is_err() {
        tracing::error!(written, "torn corpus record could not be terminated");
    }
    Err(io::Error::new(
        io::ErrorKind::WriteZero,
        format!("short append: {written} of {} bytes", line.len()),
    ))
}
