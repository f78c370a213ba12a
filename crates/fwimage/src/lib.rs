// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

pub mod field;
pub mod header;
pub mod version;

pub use self::field::BigEndian;
pub use self::header::{
    DecodeError as HeaderDecodeError, EncodeError as HeaderEncodeError, PackageHeader, PackageKind, GATEWAY_MARKER,
    HEADER_VERSION, MAGIC,
};
pub use self::version::{Error as VersionError, VersionStamp, VERSION_TAG};
