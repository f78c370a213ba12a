// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Assemble header and archive into a package file

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use fs_err as fs;
use fwimage::{HeaderDecodeError, HeaderEncodeError, PackageHeader, PackageKind, VersionError, VersionStamp};
use thiserror::Error;

use crate::archive::{self, Archiver};

/// Default location of the intermediate archive
pub const DEFAULT_ARCHIVE: &str = "package.tgz";

#[derive(Debug, Clone)]
pub struct Options {
    /// Directory the package is written to
    pub output_dir: PathBuf,
    /// Intermediate archive, removed once the package exists
    pub archive_path: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            archive_path: PathBuf::from(DEFAULT_ARCHIVE),
        }
    }
}

/// A package written to disk
#[derive(Debug)]
pub struct Package {
    pub path: PathBuf,
    pub header: PackageHeader,
    /// Bytes of archive following the header
    pub payload_len: u64,
}

/// Package `inputs` into `<type>_<major>.<minor>.<build>.img`
///
/// The first input carries the version stamp and names the package.
pub fn assemble(
    kind: PackageKind,
    inputs: &[PathBuf],
    archiver: &dyn Archiver,
    options: &Options,
) -> Result<Package, Error> {
    let inputs = dedup(inputs);
    let stamped = inputs.first().ok_or(Error::NoInputs)?;

    let stamp = VersionStamp::from_file(stamped).map_err(|source| Error::VersionStamp {
        path: stamped.clone(),
        source,
    })?;
    log::debug!(
        "Found version {}.{}.{} in {}",
        stamp.major,
        stamp.minor,
        stamp.build,
        stamped.display()
    );

    let header = PackageHeader::new(&stamp, kind)?;

    // A file already at the archive path is not ours to clean up after a failure
    let preexisting = options.archive_path.exists();

    let result = archiver
        .archive(&inputs, &options.archive_path)
        .map_err(Error::from)
        .and_then(|()| emit(header, options));

    if result.is_ok() {
        fs::remove_file(&options.archive_path).map_err(Error::RemoveArchive)?;
    } else if !preexisting && options.archive_path.exists() {
        if let Err(error) = fs::remove_file(&options.archive_path) {
            log::warn!("Failed to remove intermediate archive: {error}");
        }
    }

    result
}

fn emit(mut header: PackageHeader, options: &Options) -> Result<Package, Error> {
    let payload = fs::read(&options.archive_path).map_err(Error::ReadArchive)?;
    header.set_file_size(payload.len() as u64)?;
    log::debug!("Archive is {} bytes", payload.len());

    let path = options.output_dir.join(header.filename());
    write_package(&path, &header, &payload).map_err(Error::PackageWrite)?;
    verify(&path, &header)?;

    Ok(Package {
        path,
        header,
        payload_len: payload.len() as u64,
    })
}

/// Read back the header of the written package and compare it to `expected`
fn verify(path: &Path, expected: &PackageHeader) -> Result<(), Error> {
    let file = fs::File::open(path).map_err(|source| Error::Verify(source.into()))?;
    let written = PackageHeader::decode(file).map_err(Error::Verify)?;

    if written != *expected {
        return Err(Error::VerifyMismatch(path.to_owned()));
    }

    Ok(())
}

/// Write header and payload to `path`
///
/// Goes through a sibling temporary so `path` only ever appears complete.
fn write_package(path: &Path, header: &PackageHeader, payload: &[u8]) -> Result<(), io::Error> {
    let partial = partial_path(path);

    let written = write_file(&partial, header, payload).and_then(|()| fs::rename(&partial, path));

    if written.is_err() && partial.exists() {
        let _ = fs::remove_file(&partial);
    }

    written
}

fn write_file(path: &Path, header: &PackageHeader, payload: &[u8]) -> Result<(), io::Error> {
    let mut file = fs::File::create(path)?;

    header.encode(&mut file)?;
    file.write_all(payload)?;
    file.flush()?;
    file.sync_all()?;

    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Drop repeated paths, keeping the first occurrence of each
///
/// Paths are compared as given, byte for byte. `Path` equality would treat
/// `out//app.bin` and `out/app.bin` as the same file.
fn dedup(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut unique: Vec<PathBuf> = Vec::with_capacity(inputs.len());

    for input in inputs {
        if unique.iter().any(|seen| seen.as_os_str() == input.as_os_str()) {
            log::debug!("Skipping duplicate input {}", input.display());
        } else {
            unique.push(input.clone());
        }
    }

    unique
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no input files")]
    NoInputs,
    #[error("version stamp of {path:?}")]
    VersionStamp {
        path: PathBuf,
        #[source]
        source: VersionError,
    },
    #[error("header")]
    Header(#[from] HeaderEncodeError),
    #[error("archive")]
    Archive(#[from] archive::Error),
    #[error("read archive")]
    ReadArchive(#[source] io::Error),
    #[error("write package")]
    PackageWrite(#[source] io::Error),
    #[error("remove archive")]
    RemoveArchive(#[source] io::Error),
    #[error("read back package header")]
    Verify(#[source] HeaderDecodeError),
    #[error("package header at {0:?} does not match what was written")]
    VerifyMismatch(PathBuf),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let inputs = ["app.bin", "readme.txt", "app.bin", "lib.so", "readme.txt"].map(PathBuf::from);

        assert_eq!(dedup(&inputs), ["app.bin", "readme.txt", "lib.so"].map(PathBuf::from));
    }

    #[test]
    fn dedup_compares_exact_paths() {
        let inputs = ["app.bin", "./app.bin", "out/app.bin", "out//app.bin", "lib/", "lib"].map(PathBuf::from);
        let unique = dedup(&inputs);

        assert_eq!(unique.len(), inputs.len());
        for (kept, given) in unique.iter().zip(&inputs) {
            assert_eq!(kept.as_os_str(), given.as_os_str());
        }
    }

    #[test]
    fn partial_sibling() {
        assert_eq!(
            partial_path(Path::new("out/app_1.2.03.img")),
            Path::new("out/.app_1.2.03.img.partial")
        );
    }

    #[test]
    fn write_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = VersionStamp::from_bytes("app.bin", b"EXEVERSION 1.2.3").unwrap();
        let header = PackageHeader::new(&stamp, PackageKind::Firmware).unwrap();
        let path = dir.path().join("missing").join(header.filename());

        assert!(write_package(&path, &header, b"payload").is_err());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn verify_reads_back_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = VersionStamp::from_bytes("app.bin", b"EXEVERSION 1.2.3").unwrap();
        let mut header = PackageHeader::new(&stamp, PackageKind::Firmware).unwrap();
        header.set_file_size(7).unwrap();
        let path = dir.path().join(header.filename());

        write_package(&path, &header, b"payload").unwrap();
        assert!(verify(&path, &header).is_ok());

        let mut other = header.clone();
        other.major = 2;
        assert!(matches!(verify(&path, &other), Err(Error::VerifyMismatch(_))));

        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            verify(&path, &header),
            Err(Error::Verify(HeaderDecodeError::InvalidMagic))
        ));

        fs::write(&path, &bytes[..100]).unwrap();
        assert!(matches!(
            verify(&path, &header),
            Err(Error::Verify(HeaderDecodeError::NotEnoughBytes))
        ));
    }
}
