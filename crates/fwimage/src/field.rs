// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Big endian integers stored at fixed offsets of a byte buffer

/// An unsigned integer with a fixed big endian encoding
///
/// Both accessors panic if the field does not fit within `bytes`. Callers
/// pass offsets that are constants of a fixed layout.
pub trait BigEndian: Copy {
    /// Encoded width in bytes
    const WIDTH: usize;

    fn put(self, bytes: &mut [u8], at: usize);

    fn get(bytes: &[u8], at: usize) -> Self;
}

macro_rules! big_endian {
    ($($ty:ty),*) => {
        $(
            impl BigEndian for $ty {
                const WIDTH: usize = <$ty>::BITS as usize / 8;

                fn put(self, bytes: &mut [u8], at: usize) {
                    bytes[at..at + Self::WIDTH].copy_from_slice(&self.to_be_bytes());
                }

                fn get(bytes: &[u8], at: usize) -> Self {
                    let mut field = <$ty>::default().to_be_bytes();
                    field.copy_from_slice(&bytes[at..at + Self::WIDTH]);
                    Self::from_be_bytes(field)
                }
            }
        )*
    };
}

big_endian!(u8, u16, u32, u64);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn most_significant_byte_first() {
        let mut bytes = [0u8; 15];
        0x0102u16.put(&mut bytes, 0);
        0x0304_0506u32.put(&mut bytes, 2);
        0x0708_090a_0b0c_0d0eu64.put(&mut bytes, 6);
        0x0fu8.put(&mut bytes, 14);

        assert_eq!(bytes.to_vec(), (1..=15).collect::<Vec<u8>>());
    }

    #[test]
    fn fields_leave_neighbours_alone() {
        let mut bytes = [0xaa; 8];
        0u16.put(&mut bytes, 3);

        assert_eq!(bytes, [0xaa, 0xaa, 0xaa, 0, 0, 0xaa, 0xaa, 0xaa]);
        assert_eq!(u32::get(&bytes, 2), 0xaa00_00aa);
    }

    #[test]
    fn values_survive_a_store() {
        let mut bytes = [0u8; 16];
        for value in [0, 1, 0xff, 0x100, 0xdead_beef, u32::MAX - 1, u32::MAX] {
            value.put(&mut bytes, 5);
            assert_eq!(u32::get(&bytes, 5), value);
        }

        (u64::MAX - 7).put(&mut bytes, 8);
        assert_eq!(u64::get(&bytes, 8), u64::MAX - 7);
        assert_eq!(u8::get(&bytes, 15), 0xf8);
    }

    #[test]
    #[should_panic]
    fn field_past_the_end() {
        u32::get(&[0u8, 1, 2], 0);
    }
}
