//! Size-rotating file writer plugged into `tracing_subscriber::fmt`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

use crate::logger::compression::gzip_file;
use crate::logger::config::{FileConfig, RotationConfig};

#[derive(Clone)]
pub struct RotatingFileWriter {
    state: Arc<Mutex<WriterState>>,
}

struct WriterState {
    path: PathBuf,
    rotation: RotationConfig,
    file: File,
    size: u64,
}

impl RotatingFileWriter {
    pub fn new(config: &FileConfig) -> io::Result<Self> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = open(&config.path, config.append)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            state: Arc::new(Mutex::new(WriterState {
                path: config.path.clone(),
                rotation: config.rotation.clone(),
                file,
                size,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        // A panic mid-write leaves the file usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn open(path: &Path, append: bool) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
}

fn numbered(path: &Path, index: usize, compressed: bool) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    if compressed {
        name.push(".gz");
    }
    PathBuf::from(name)
}

impl WriterState {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let keep = self.rotation.max_files;
        let compress = self.rotation.compress;

        let oldest = numbered(&self.path, keep, compress);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..keep).rev() {
            let from = numbered(&self.path, index, compress);
            if from.exists() {
                fs::rename(&from, numbered(&self.path, index + 1, compress))?;
            }
        }

        let first = numbered(&self.path, 1, false);
        fs::rename(&self.path, &first)?;
        if compress {
            gzip_file(&first)?;
        }

        self.file = open(&self.path, false)?;
        self.size = 0;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.rotation.max_size {
            // Keep logging into the current file if the rename fails
            if let Err(e) = self.rotate() {
                eprintln!("log rotation failed for {}: {}", self.path.display(), e);
            }
        }
        self.file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(buf.len())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
