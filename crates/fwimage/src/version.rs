// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Version stamps embedded in executables
//!
//! A stamped binary carries a C string of the form `EXEVERSION 1.2.3`
//! somewhere in its data. We locate the first occurrence and split the
//! dotted version into its numeric components.

use std::{io, path::Path};

use fs_err as fs;
use thiserror::Error;

/// Marker preceding the dotted version, trailing space included
pub const VERSION_TAG: &[u8; 11] = b"EXEVERSION ";

/// Version information recovered from a stamped binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStamp {
    /// Base name of the stamped file, without directories or extension
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl VersionStamp {
    /// Read `path` fully and extract its version stamp
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;

        Self::from_bytes(&path.to_string_lossy(), &bytes)
    }

    /// Extract the version stamp from the raw contents of `filename`
    pub fn from_bytes(filename: &str, bytes: &[u8]) -> Result<Self, Error> {
        let start = find_tag(bytes).ok_or(Error::MissingVersionTag)? + VERSION_TAG.len();

        // The stamp is a C string, anything past the terminator is unrelated data
        let text = &bytes[start..];
        let text = text.iter().position(|&b| b == 0).map_or(text, |end| &text[..end]);

        let (major, minor, build) = parse_dotted_version(text);

        Ok(Self {
            name: base_name(filename).to_owned(),
            major,
            minor,
            build,
        })
    }
}

/// Strip directories and everything from the first `.` onwards
pub fn base_name(filename: &str) -> &str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    name.split('.').next().unwrap_or(name)
}

/// Offset of the first [`VERSION_TAG`] in `bytes`
fn find_tag(bytes: &[u8]) -> Option<usize> {
    bytes.windows(VERSION_TAG.len()).position(|window| window == VERSION_TAG)
}

/// Split `x.y.z` into its components, missing components are zero
///
/// Each separator search starts one byte into the current component, so a
/// leading `.` is consumed as part of the component rather than as a separator.
pub fn parse_dotted_version(text: &[u8]) -> (u32, u32, u32) {
    let major = leading_digits(text);

    let minor_text = next_component(text);
    let minor = minor_text.map(leading_digits).unwrap_or_default();

    let build = minor_text
        .and_then(next_component)
        .map(leading_digits)
        .unwrap_or_default();

    (major, minor, build)
}

fn next_component(text: &[u8]) -> Option<&[u8]> {
    let rest = text.get(1..)?;
    let dot = rest.iter().position(|&b| b == b'.')?;
    Some(&rest[dot + 1..])
}

/// Value of the leading decimal number in `text`, zero when there is none
///
/// Like C's `atoi`, leading whitespace is skipped and a `+` sign is
/// accepted. Components are unsigned, so a `-` sign ends parsing with zero.
/// Parsing stops at the first non-digit. Values too large for a `u32`
/// saturate so they are caught by later range checks.
pub fn leading_digits(text: &[u8]) -> u32 {
    let start = text.iter().position(|&b| !is_c_space(b)).unwrap_or(text.len());
    let text = &text[start..];
    let digits = text.strip_prefix(b"+").unwrap_or(text);

    digits
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// Whitespace as C's `isspace` sees it, which includes vertical tab
fn is_c_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no version number found")]
    MissingVersionTag,
    #[error("io")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    fn stamp(bytes: &[u8]) -> VersionStamp {
        VersionStamp::from_bytes("app.bin", bytes).expect("stamped")
    }

    #[test]
    fn leading_digit_prefix() {
        assert_eq!(leading_digits(b"42"), 42);
        assert_eq!(leading_digits(b"3abc"), 3);
        assert_eq!(leading_digits(b"007"), 7);
        assert_eq!(leading_digits(b""), 0);
        assert_eq!(leading_digits(b"abc"), 0);
        assert_eq!(leading_digits(b" 5"), 5);
        assert_eq!(leading_digits(b"\t\x0b\r\n12x"), 12);
        assert_eq!(leading_digits(b"+8"), 8);
        assert_eq!(leading_digits(b" +8"), 8);
        assert_eq!(leading_digits(b"-8"), 0);
        assert_eq!(leading_digits(b"+ 8"), 0);
        assert_eq!(leading_digits(b"   "), 0);
        assert_eq!(leading_digits(b"99999999999999"), u32::MAX);
    }

    #[test]
    fn dotted_versions() {
        assert_eq!(parse_dotted_version(b"3.14.159"), (3, 14, 159));
        assert_eq!(parse_dotted_version(b"7"), (7, 0, 0));
        assert_eq!(parse_dotted_version(b"7.1"), (7, 1, 0));
        assert_eq!(parse_dotted_version(b"1.2.3abc"), (1, 2, 3));
        assert_eq!(parse_dotted_version(b"1.2.3.4"), (1, 2, 3));
        assert_eq!(parse_dotted_version(b"1..3"), (1, 0, 3));
        assert_eq!(parse_dotted_version(b".5.6"), (0, 6, 0));
        assert_eq!(parse_dotted_version(b""), (0, 0, 0));
        assert_eq!(parse_dotted_version(b" 1.2.3"), (1, 2, 3));
        assert_eq!(parse_dotted_version(b"1. 2. 3"), (1, 2, 3));
        assert_eq!(parse_dotted_version(b"+4.+5.+6"), (4, 5, 6));
    }

    #[test]
    fn finds_stamp_in_binary_data() {
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 0, 0xff, b'E', b'X', b'E'];
        bytes.extend_from_slice(b"EXEVERSION 3.14.159\0");
        bytes.extend_from_slice(&[0xde, 0xad, b'.', b'9']);

        let stamp = stamp(&bytes);
        assert_eq!((stamp.major, stamp.minor, stamp.build), (3, 14, 159));
    }

    #[test]
    fn missing_components_default_to_zero() {
        let stamp = stamp(b"EXEVERSION 7");
        assert_eq!((stamp.major, stamp.minor, stamp.build), (7, 0, 0));
    }

    #[test]
    fn terminator_bounds_the_version() {
        let stamp = stamp(b"EXEVERSION 7\0junk.5.6");
        assert_eq!((stamp.major, stamp.minor, stamp.build), (7, 0, 0));
    }

    #[test]
    fn first_tag_wins() {
        let stamp = stamp(b"EXEVERSION 1.0.1\0EXEVERSION 2.0.2\0");
        assert_eq!((stamp.major, stamp.minor, stamp.build), (1, 0, 1));
    }

    #[test]
    fn tag_at_end_of_buffer() {
        let stamp = stamp(b"padding EXEVERSION ");
        assert_eq!((stamp.major, stamp.minor, stamp.build), (0, 0, 0));
    }

    #[test]
    fn missing_tag() {
        for bytes in [&b""[..], b"EXEVERSION", b"EXEVERSION3.1.4", b"exeversion 1.2.3"] {
            assert!(matches!(
                VersionStamp::from_bytes("app.bin", bytes),
                Err(Error::MissingVersionTag)
            ));
        }
    }

    #[test]
    fn name_from_filename() {
        assert_eq!(base_name("app.bin"), "app");
        assert_eq!(base_name("build/out/app.bin"), "app");
        assert_eq!(base_name("/abs/gw.tar.gz"), "gw");
        assert_eq!(base_name("./release/app"), "app");
        assert_eq!(base_name("v1.2/app"), "app");
        assert_eq!(base_name("app"), "app");
        assert_eq!(base_name(".hidden"), "");
    }

    #[test]
    fn name_uses_stamped_filename() {
        let stamp = VersionStamp::from_bytes("out/sensor.elf", b"EXEVERSION 2.0.1").unwrap();
        assert_eq!(stamp.name, "sensor");
    }
}
