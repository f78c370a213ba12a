// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::{BigEndian, VersionStamp};

/// Well defined magic field for a package header
///
/// The byte sequence is symmetric, so legacy loaders reading it in host
/// order on little endian machines see the same value.
pub const MAGIC: u64 = 0xDEAD_ACDC_DCAC_ADDE;

/// Revision of the header layout
pub const HEADER_VERSION: u32 = 1;

/// Marker legacy software uses to recognise gateway packages
pub const GATEWAY_MARKER: [u8; 4] = *b"*UF*";

/// Field offsets within the encoded header
pub mod offset {
    pub const MAGIC: usize = 0;
    pub const HEADER_VERSION: usize = 8;
    pub const FILE_SIZE: usize = 12;
    pub const FILLER1: usize = 16;
    pub const GW_MARKER: usize = 64;
    pub const TYPE: usize = 68;
    pub const FILLER2: usize = 132;
    pub const MAJOR: usize = 256;
    pub const MINOR: usize = 257;
    pub const BUILD_H: usize = 258;
    pub const BUILD_L: usize = 259;
    pub const FILLER3: usize = 260;
}

const TYPE_LEN: usize = offset::FILLER2 - offset::TYPE;

/// Longest type name that still leaves room for a terminating NUL
pub const MAX_TYPE_LEN: usize = TYPE_LEN - 1;

/// Product variant a package is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Gateway,
    Firmware,
}

/// Fixed 512 byte header prepended to every package
///
/// Layout, all integers big endian:
///
/// ```text
/// Offset  Size  Field
/// 0       8     magic
/// 8       4     header_version
/// 12      4     file_size
/// 16      48    reserved
/// 64      4     gw_marker ("*UF*" or zero)
/// 68      64    type (NUL padded)
/// 132     124   reserved
/// 256     1     major
/// 257     1     minor
/// 258     2     build
/// 260     252   reserved
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub kind: PackageKind,
    /// Byte length of the payload following the header
    pub file_size: u32,
    /// Validated on construction, always fits the type field
    name: String,
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl PackageHeader {
    /// Size of the encoded header in bytes
    pub const SIZE: usize = 512;

    /// Build the header for `stamp`, payload size is filled in later
    pub fn new(stamp: &VersionStamp, kind: PackageKind) -> Result<Self, EncodeError> {
        if stamp.name.is_empty() {
            return Err(EncodeError::EmptyName);
        }
        // Legacy loaders read the type as a C string of plain ASCII
        if !stamp.name.is_ascii() || stamp.name.contains('\0') {
            return Err(EncodeError::InvalidName(stamp.name.clone()));
        }
        if stamp.name.len() > MAX_TYPE_LEN {
            return Err(EncodeError::NameTooLong(stamp.name.clone()));
        }

        let major = u8::try_from(stamp.major).map_err(|_| EncodeError::MajorOutOfRange(stamp.major))?;
        let minor = u8::try_from(stamp.minor).map_err(|_| EncodeError::MinorOutOfRange(stamp.minor))?;
        let build = u16::try_from(stamp.build).map_err(|_| EncodeError::BuildOutOfRange(stamp.build))?;

        Ok(Self {
            kind,
            file_size: 0,
            name: stamp.name.clone(),
            major,
            minor,
            build,
        })
    }

    /// Package type, the base name of the stamped file
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_file_size(&mut self, len: u64) -> Result<(), EncodeError> {
        self.file_size = u32::try_from(len).map_err(|_| EncodeError::PayloadTooLarge(len))?;
        Ok(())
    }

    /// Name of the package file this header belongs to
    ///
    /// This will look like "app_1.2.03.img"
    pub fn filename(&self) -> String {
        format!("{}_{}.{}.{:02}.img", self.name, self.major, self.minor, self.build)
    }

    fn marker(&self) -> [u8; 4] {
        match self.kind {
            PackageKind::Gateway => GATEWAY_MARKER,
            PackageKind::Firmware => [0; 4],
        }
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        writer.write_all(&self.to_bytes())
    }

    /// Encoded header, reserved ranges are zero
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];

        MAGIC.put(&mut bytes, offset::MAGIC);
        HEADER_VERSION.put(&mut bytes, offset::HEADER_VERSION);
        self.file_size.put(&mut bytes, offset::FILE_SIZE);
        bytes[offset::GW_MARKER..offset::TYPE].copy_from_slice(&self.marker());
        bytes[offset::TYPE..offset::TYPE + self.name.len()].copy_from_slice(self.name.as_bytes());
        self.major.put(&mut bytes, offset::MAJOR);
        self.minor.put(&mut bytes, offset::MINOR);
        // build_h and build_l together are the big endian build number
        self.build.put(&mut bytes, offset::BUILD_H);

        bytes
    }

    pub fn decode<R: Read>(mut reader: R) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; Self::SIZE];
        reader.read_exact(&mut bytes)?;

        let magic = u64::get(&bytes, offset::MAGIC);
        let version = u32::get(&bytes, offset::HEADER_VERSION);
        let file_size = u32::get(&bytes, offset::FILE_SIZE);

        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        if version != HEADER_VERSION {
            return Err(DecodeError::UnknownVersion(version));
        }

        let mut marker = [0u8; 4];
        marker.copy_from_slice(&bytes[offset::GW_MARKER..offset::TYPE]);
        let kind = match marker {
            GATEWAY_MARKER => PackageKind::Gateway,
            [0, 0, 0, 0] => PackageKind::Firmware,
            other => return Err(DecodeError::InvalidMarker(other)),
        };

        let name = &bytes[offset::TYPE..offset::FILLER2];
        let len = name.iter().position(|&b| b == 0).ok_or(DecodeError::InvalidType)?;
        let name = &name[..len];
        if name.is_empty() || !name.is_ascii() {
            return Err(DecodeError::InvalidType);
        }

        Ok(Self {
            kind,
            file_size,
            name: String::from_utf8_lossy(name).into_owned(),
            major: u8::get(&bytes, offset::MAJOR),
            minor: u8::get(&bytes, offset::MINOR),
            build: u16::get(&bytes, offset::BUILD_H),
        })
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("type name {0:?} exceeds {MAX_TYPE_LEN} bytes")]
    NameTooLong(String),
    #[error("type name is empty")]
    EmptyName,
    #[error("type name {0:?} is not plain ASCII")]
    InvalidName(String),
    #[error("major version {0} does not fit in 8 bits")]
    MajorOutOfRange(u32),
    #[error("minor version {0} does not fit in 8 bits")]
    MinorOutOfRange(u32),
    #[error("build number {0} does not fit in 16 bits")]
    BuildOutOfRange(u32),
    #[error("payload of {0} bytes does not fit in 32 bits")]
    PayloadTooLarge(u64),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Header must be {} bytes long", PackageHeader::SIZE)]
    NotEnoughBytes,
    #[error("Invalid magic")]
    InvalidMagic,
    #[error("Unknown version: {0}")]
    UnknownVersion(u32),
    #[error("Invalid gateway marker: {0:?}")]
    InvalidMarker([u8; 4]),
    #[error("Invalid type name")]
    InvalidType,
    #[error("io")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::NotEnoughBytes,
            _ => DecodeError::Io(error),
        }
    }
}
