use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::HepRefError;

/// Open a temporary file beside `destination` for a download to stream into.
///
/// Dropping the returned file without [`persist_staged`] removes it.
pub(crate) fn staging_file(destination: &Path) -> Result<NamedTempFile, HepRefError> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    NamedTempFile::new_in(parent).map_err(|source| HepRefError::Write {
        path: parent.to_path_buf(),
        source,
    })
}

/// Move a completed download into place at `destination`.
pub(crate) fn persist_staged(
    mut staged: NamedTempFile,
    destination: &Path,
) -> Result<(), HepRefError> {
    staged.flush().map_err(|source| HepRefError::Write {
        path: staged.path().to_path_buf(),
        source,
    })?;
    staged
        .persist(destination)
        .map_err(|err| HepRefError::Write {
            path: destination.to_path_buf(),
            source: err.error,
        })?;
    Ok(())
}

/// Extract `archive` so that its entries appear directly inside `record_dir`.
///
/// Entries are unpacked into a scratch directory next to `record_dir` that is
/// renamed into place once complete, so readers never observe a partially
/// extracted record. A `record_dir` left behind without a manifest is
/// replaced.
pub(crate) fn extract_archive(archive: &Path, record_dir: &Path) -> Result<(), HepRefError> {
    let parent = record_dir.parent().unwrap_or_else(|| Path::new("."));
    let file = File::open(archive).map_err(|source| HepRefError::Read {
        path: archive.to_path_buf(),
        source,
    })?;

    let mut zip =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|source| HepRefError::Archive {
            path: archive.to_path_buf(),
            source,
        })?;

    let scratch = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(|source| HepRefError::Write {
            path: parent.to_path_buf(),
            source,
        })?;

    debug!(
        archive = %archive.display(),
        entries = zip.len(),
        scratch = %scratch.path().display(),
        "extracting archive"
    );

    zip.extract(scratch.path())
        .map_err(|source| HepRefError::Archive {
            path: archive.to_path_buf(),
            source,
        })?;

    if record_dir.exists() {
        warn!(record_dir = %record_dir.display(), "replacing incomplete record directory");
        fs::remove_dir_all(record_dir).map_err(|source| HepRefError::Write {
            path: record_dir.to_path_buf(),
            source,
        })?;
    }

    fs::rename(scratch.path(), record_dir).map_err(|source| HepRefError::Write {
        path: record_dir.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(contents.as_bytes()).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    fn stage(bytes: &[u8], destination: &Path) {
        let mut staged = staging_file(destination).expect("staging file");
        staged.write_all(bytes).expect("write staged");
        persist_staged(staged, destination).expect("persist");
    }

    #[test]
    fn extracts_entries_into_record_dir() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let archive = temp.path().join("HEPData-1-v1.zip");
        let record_dir = temp.path().join("HEPData-1-v1");

        stage(
            &zip_bytes(&[("submission.yaml", "---\n"), ("Table1.yaml", "a: 1\n")]),
            &archive,
        );
        extract_archive(&archive, &record_dir).expect("extract");

        assert!(record_dir.join("submission.yaml").is_file());
        assert!(record_dir.join("Table1.yaml").is_file());

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".extract-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn incomplete_record_dir_is_replaced() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let archive = temp.path().join("HEPData-1-v1.zip");
        let record_dir = temp.path().join("HEPData-1-v1");
        fs::create_dir_all(&record_dir).expect("mkdir");
        fs::write(record_dir.join("stale.yaml"), "b: 2\n").expect("write stale");

        stage(&zip_bytes(&[("submission.yaml", "---\n")]), &archive);
        extract_archive(&archive, &record_dir).expect("extract over incomplete dir");

        assert!(record_dir.join("submission.yaml").is_file());
        assert!(!record_dir.join("stale.yaml").exists());
    }

    #[test]
    fn dropped_staging_file_leaves_nothing_behind() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let destination = temp.path().join("HEPData-1-v1.zip");
        {
            let mut staged = staging_file(&destination).expect("staging file");
            staged.write_all(b"partial").expect("write");
        }
        assert!(!destination.exists());
        assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn corrupt_archive_is_reported_with_path() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").expect("write");

        let err = extract_archive(&archive, &temp.path().join("out")).expect_err("fail");
        match err {
            HepRefError::Archive { path, .. } => assert_eq!(path, archive),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!temp.path().join("out").exists());
    }
}
