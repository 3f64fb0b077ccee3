use std::ops::RangeInclusive;

/// Bit helpers used by the decoders and the register models.
/// The index (`bit_idx`) goes from lsb to msb (right to left).
pub trait Bits: Copy {
    const WIDTH: u8;

    fn is_bit_on(self, bit_idx: u8) -> bool;

    fn is_bit_off(self, bit_idx: u8) -> bool {
        !self.is_bit_on(bit_idx)
    }

    fn set_bit_on(&mut self, bit_idx: u8);

    fn set_bit_off(&mut self, bit_idx: u8);

    fn set_bit(&mut self, bit_idx: u8, value: bool) {
        if value {
            self.set_bit_on(bit_idx);
        } else {
            self.set_bit_off(bit_idx);
        }
    }

    fn get_bit(self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    /// Extracts `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Returns true only when every bit in the range is set.
    fn are_bits_on(self, bits_range: RangeInclusive<u8>) -> bool {
        bits_range.into_iter().all(|idx| self.is_bit_on(idx))
    }

    fn get_byte(self, byte_nth: u8) -> u8;

    fn set_byte(&mut self, byte_nth: u8, value: u8);

    /// Interprets the low `number_of_bits` as a two's complement number
    /// and sign-extends it to the full width.
    fn sign_extended(self, number_of_bits: u8) -> Self;
}

macro_rules! impl_bits {
    ($($ty:ty => $signed:ty),* $(,)?) => {
        $(
            impl Bits for $ty {
                const WIDTH: u8 = <$ty>::BITS as u8;

                fn is_bit_on(self, bit_idx: u8) -> bool {
                    debug_assert!(bit_idx < Self::WIDTH);
                    (self >> bit_idx) & 1 == 1
                }

                fn set_bit_on(&mut self, bit_idx: u8) {
                    debug_assert!(bit_idx < Self::WIDTH);
                    *self |= 1 << bit_idx;
                }

                fn set_bit_off(&mut self, bit_idx: u8) {
                    debug_assert!(bit_idx < Self::WIDTH);
                    *self &= !(1 << bit_idx);
                }

                fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let end = *bits_range.end();
                    debug_assert!(start <= end && end < Self::WIDTH);

                    let length = u32::from(end - start + 1);
                    let mask = <$ty>::MAX.checked_shr(<$ty>::BITS - length).unwrap_or(0);
                    (self >> start) & mask
                }

                fn get_byte(self, byte_nth: u8) -> u8 {
                    debug_assert!(byte_nth < Self::WIDTH / 8);
                    (self >> (byte_nth * 8)) as u8
                }

                fn set_byte(&mut self, byte_nth: u8, value: u8) {
                    debug_assert!(byte_nth < Self::WIDTH / 8);
                    let shift = byte_nth * 8;
                    *self = (*self & !(0xFF << shift)) | (<$ty>::from(value) << shift);
                }

                fn sign_extended(self, number_of_bits: u8) -> Self {
                    debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);
                    // Move the sign bit up to the msb and let the arithmetic
                    // shift drag it back down.
                    let unused = Self::WIDTH - number_of_bits;
                    (((self << unused) as $signed) >> unused) as $ty
                }
            }
        )*
    };
}

impl_bits!(u8 => i8, u16 => i16, u32 => i32, u64 => i64);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_on() {
        let b = 0b1_1001_1101_u32;
        assert!(b.is_bit_on(0));
        assert!(!b.is_bit_on(1));
        assert!(b.is_bit_on(2));
        assert!(b.is_bit_on(3));
        assert!(b.is_bit_on(8));
        assert!(!b.is_bit_on(31));
        assert!(b.is_bit_off(31));
    }

    #[test]
    fn test_set_on_off() {
        let mut b = 0b1_1001_1101_u32;
        b.set_bit_on(1);
        b.set_bit_on(11);
        assert_eq!(b, 0b1001_1001_1111);

        b.set_bit_off(0);
        b.set_bit(4, false);
        assert_eq!(b, 0b1001_1000_1110);
    }

    #[test]
    fn test_get_bits() {
        let b = 0xE12F_FF1E_u32;
        assert_eq!(b.get_bits(28..=31), 0xE);
        assert_eq!(b.get_bits(0..=3), 0xE);
        assert_eq!(b.get_bits(0..=31), b);
        assert_eq!(b.get_bits(4..=4), 1);
        assert!(b.are_bits_on(8..=19));
        assert!(!b.are_bits_on(0..=4));

        let h = 0xDF42_u16;
        assert_eq!(h.get_bits(8..=15), 0xDF);
        assert_eq!(h.get_bits(0..=15), 0xDF42);
    }

    #[test]
    fn test_bytes() {
        let mut b = 0x1234_5678_u32;
        assert_eq!(b.get_byte(0), 0x78);
        assert_eq!(b.get_byte(3), 0x12);

        b.set_byte(1, 0xAB);
        assert_eq!(b, 0x1234_AB78);

        let mut h = 0_u16;
        h.set_byte(1, 0xFF);
        assert_eq!(h, 0xFF00);
    }

    #[test]
    fn test_sign_extended() {
        assert_eq!(0b1001_u32.sign_extended(4), 0xFFFF_FFF9);
        assert_eq!(0b0111_u32.sign_extended(4), 7);
        assert_eq!(0x80_u16.sign_extended(8), 0xFF80);
        assert_eq!(0x00FF_FFFE_u32.sign_extended(24), 0xFFFF_FFFE);
        assert_eq!(0xFFFF_FFFF_u32.sign_extended(32), 0xFFFF_FFFF);
    }

    #[test]
    fn test_random_byte_round_trip() {
        for _ in 0..64 {
            let value = rand::random::<u32>();
            let mut rebuilt = 0_u32;
            for i in 0..4 {
                rebuilt.set_byte(i, value.get_byte(i));
            }
            assert_eq!(rebuilt, value);
            assert_eq!(value.get_bits(0..=15) as u16, value as u16);
        }
    }
}
