// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Produce the compressed payload of a package

use std::{
    io,
    path::{Component, Path, PathBuf},
    process,
};

use flate2::{write::GzEncoder, Compression};
use fs_err as fs;
use thiserror::Error;

use crate::process::{display, run};

/// Bundles input files into a single compressed archive
pub trait Archiver {
    /// Archive `inputs`, in order, into a new file at `destination`
    fn archive(&self, inputs: &[PathBuf], destination: &Path) -> Result<(), Error>;
}

/// Gzip'd tarball created by the system `tar`
///
/// This is the format legacy loaders expect.
#[derive(Debug, Clone)]
pub struct TarCommand {
    pub program: PathBuf,
    /// Echo the command line and the files tar reports
    pub verbose: bool,
}

impl Default for TarCommand {
    fn default() -> Self {
        Self {
            program: "tar".into(),
            verbose: false,
        }
    }
}

impl Archiver for TarCommand {
    fn archive(&self, inputs: &[PathBuf], destination: &Path) -> Result<(), Error> {
        let mut command = process::Command::new(&self.program);
        command
            .arg(if self.verbose { "cvzf" } else { "czf" })
            .arg(destination)
            .args(inputs);

        if self.verbose {
            println!("Running: {}", display(&command));
        } else {
            log::debug!("Running: {}", display(&command));
        }

        let status = run(&mut command, |line| {
            if self.verbose {
                println!("{line}");
            } else {
                log::trace!("{line}");
            }
        })?;

        if !status.success() {
            return Err(Error::ArchiverFailure(status));
        }

        Ok(())
    }
}

/// Gzip'd tarball written in-process
///
/// Useful on hosts without a `tar` binary. Entries are stored under the
/// path they were given with, minus any root or parent components.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTar;

impl Archiver for BuiltinTar {
    fn archive(&self, inputs: &[PathBuf], destination: &Path) -> Result<(), Error> {
        let file = fs::File::create(destination)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        for input in inputs {
            let name = entry_name(input);
            log::trace!("Adding {} as {}", input.display(), name.display());

            if input.is_dir() {
                builder.append_dir_all(&name, input)?;
            } else {
                builder.append_path_with_name(input, &name)?;
            }
        }

        builder.into_inner()?.finish()?;

        Ok(())
    }
}

/// Relative name an input is stored under
fn entry_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("archiver exited with {0}")]
    ArchiverFailure(process::ExitStatus),
    #[error("io")]
    Io(#[from] io::Error),
}
