// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fwpack::{package, Archiver, BuiltinTar, Options, PackageKind, TarCommand};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(
    name = "fwpack",
    version,
    about = "Package firmware and gateway files behind a versioned image header"
)]
pub struct Command {
    #[arg(value_enum, help = "Package type")]
    pub kind: Kind,
    #[arg(
        required = true,
        help = "Files to package, the first one carries the version stamp and names the package"
    )]
    pub files: Vec<PathBuf>,
    #[arg(short, long, default_value = ".", help = "Directory to write the package to")]
    pub output_dir: PathBuf,
    #[arg(long, default_value = package::DEFAULT_ARCHIVE, help = "Intermediate archive path")]
    pub archive: PathBuf,
    #[arg(long, help = "Create the archive in-process instead of running tar")]
    pub builtin_archiver: bool,
    #[arg(short, long, help = "Show the archiver command and its output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    #[value(name = "gw")]
    Gateway,
    #[value(name = "fw")]
    Firmware,
}

impl From<Kind> for PackageKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Gateway => PackageKind::Gateway,
            Kind::Firmware => PackageKind::Firmware,
        }
    }
}

pub fn handle(command: Command) -> Result<(), Error> {
    let Command {
        kind,
        files,
        output_dir,
        archive,
        builtin_archiver,
        verbose,
    } = command;

    let archiver: Box<dyn Archiver> = if builtin_archiver {
        Box::new(BuiltinTar)
    } else {
        Box::new(TarCommand {
            verbose,
            ..Default::default()
        })
    };

    let options = Options {
        output_dir,
        archive_path: archive,
    };

    let package = fwpack::assemble(kind.into(), &files, archiver.as_ref(), &options)?;

    log::debug!("Payload is {} bytes", package.payload_len);
    println!("Made package {}", package.path.display());

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("package")]
    Package(#[from] package::Error),
}
