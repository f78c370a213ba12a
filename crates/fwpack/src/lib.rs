// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

pub use fwimage::{PackageHeader, PackageKind, VersionStamp};

pub use self::archive::{Archiver, BuiltinTar, TarCommand};
pub use self::package::{assemble, Options, Package};

pub mod archive;
pub mod package;
pub mod process;
