//! Gzip for rolled log files.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

/// Compresses `path` into `path.gz` and removes the original.
pub fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let mut input = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(File::create(&target)?, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn gzip_replaces_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailflow.log.1");
        fs::write(&path, "campaign 42 completed\n").unwrap();

        let gz = gzip_file(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(gz, dir.path().join("mailflow.log.1.gz"));

        let mut decoded = String::new();
        GzDecoder::new(File::open(gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "campaign 42 completed\n");
    }
}
