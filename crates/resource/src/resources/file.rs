//! Scoped file handles.
//!
//! A [`FileResource`] opens a path in one of three modes. Its
//! [`Retention`] decides what happens to the path at release: a
//! temporary file is deleted, a persistent one (a log, an output file)
//! is closed and kept.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resource::{Acquire, Config, Resource, ResourceKind};

/// How the file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FileMode {
    /// Create or truncate; readable back through the same handle.
    Write,
    /// Create if missing and append; readable back through the same handle.
    Append,
    /// Open an existing file read-only.
    Read,
}

/// What release does to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Retention {
    /// Delete the file once the handle is closed.
    Temporary,
    /// Close the handle and keep the file.
    Persistent,
}

/// Configuration for [`FileResource`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileConfig {
    /// Path to open.
    pub path: PathBuf,
    /// Open mode.
    pub mode: FileMode,
    /// Fate of the path at release.
    pub retention: Retention,
}

impl FileConfig {
    /// A file created for this scope only and deleted afterwards.
    pub fn temporary(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Write,
            retention: Retention::Temporary,
        }
    }

    /// An append-only log that outlives the scope.
    pub fn log(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Append,
            retention: Retention::Persistent,
        }
    }

    /// A file (re)written by this scope and kept afterwards.
    pub fn output(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Write,
            retention: Retention::Persistent,
        }
    }

    /// An existing file opened for reading.
    pub fn input(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Read,
            retention: Retention::Persistent,
        }
    }
}

impl Config for FileConfig {
    fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::configuration("file path must not be empty"));
        }
        if self.mode == FileMode::Read && self.retention == Retention::Temporary {
            return Err(Error::configuration(
                "a read-only file cannot be temporary: release would delete input data",
            ));
        }
        Ok(())
    }
}

/// An open file owned by a scope.
#[derive(Debug)]
pub struct FileResource {
    name: String,
    path: PathBuf,
    mode: FileMode,
    retention: Retention,
    file: File,
    written: u64,
}

impl FileResource {
    /// The path this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written through this handle.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Write `bytes` to the file.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.mode == FileMode::Read {
            return Err(Error::operation(&self.name, "file is open read-only"));
        }
        self.file
            .write_all(bytes)
            .map_err(|e| Error::operation(&self.name, "write failed").with_source(e))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write(&buf)
    }

    /// Finish releasing once the flush has been attempted.
    ///
    /// A failed flush must not leave a temporary file behind; both failures
    /// are reported together.
    fn close_out(&self, flushed: std::io::Result<()>) -> Result<()> {
        let mut failures = Vec::new();
        if let Err(e) = flushed {
            failures.push(Error::release(&self.name, "flush failed").with_source(e));
        }
        if self.retention == Retention::Temporary
            && self.path.exists()
            && let Err(e) = fs::remove_file(&self.path)
        {
            failures.push(
                Error::release(
                    &self.name,
                    format!("could not delete {}", self.path.display()),
                )
                .with_source(e),
            );
        }
        if let Some(err) = Error::combine(None, failures) {
            return Err(err);
        }
        tracing::debug!(
            resource_id = %self.name,
            path = %self.path.display(),
            bytes = self.written,
            "file closed"
        );
        Ok(())
    }

    /// Read the whole file through the open handle.
    ///
    /// The cursor is moved to the start first; later writes in `Append`
    /// mode still go to the end.
    pub fn read_back(&mut self) -> Result<Vec<u8>> {
        let name = &self.name;
        self.file
            .flush()
            .and_then(|()| self.file.seek(SeekFrom::Start(0)))
            .map_err(|e| Error::operation(name, "seek failed").with_source(e))?;
        let mut buf = Vec::new();
        self.file
            .read_to_end(&mut buf)
            .map_err(|e| Error::operation(name, "read failed").with_source(e))?;
        Ok(buf)
    }

    /// [`read_back`](Self::read_back) decoded as UTF-8.
    pub fn read_to_string(&mut self) -> Result<String> {
        let bytes = self.read_back()?;
        String::from_utf8(bytes)
            .map_err(|e| Error::operation(&self.name, "file is not valid UTF-8").with_source(e))
    }
}

impl Resource for FileResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::File
    }

    fn release(&mut self) -> Result<()> {
        let flushed = if self.mode == FileMode::Read {
            Ok(())
        } else {
            self.file.flush()
        };
        self.close_out(flushed)
    }}

impl Acquire for FileResource {
    type Config = FileConfig;

    fn acquire(name: &str, config: &FileConfig) -> Result<Self> {
        let mut options = OpenOptions::new();
        match config.mode {
            FileMode::Write => options.read(true).write(true).create(true).truncate(true),
            FileMode::Append => options.read(true).append(true).create(true),
            FileMode::Read => options.read(true),
        };
        let file = options.open(&config.path).map_err(|e| {
            Error::acquisition(name, format!("cannot open {}", config.path.display()))
                .with_source(e)
        })?;

        Ok(Self {
            name: name.to_string(),
            path: config.path.clone(),
            mode: config.mode,
            retention: config.retention,
            file,
            written: 0,
        })
    }
}
