use std::fmt::Debug;

/// A fixed width container of individually addressable bits.
/// Bit `i` of a packed word holds the `i`-th value of its chunk, so the ordering
/// inside a word is part of the format the accelerator reads.
pub trait Word: Copy + Default + PartialEq + Debug {
    /// Number of bits in one word
    const SIZE: usize;

    /// Read bit `i`. Panics if `i >= SIZE`.
    fn get(&self, i: usize) -> bool;

    /// Assign bit `i`. Panics if `i >= SIZE`.
    fn set(&mut self, i: usize, bit: bool);

    /// Number of bits which differ between the two words
    fn mismatches(&self, other: &Self) -> usize;
}

macro_rules! impl_word {
    ($t:ty) => {
        impl Word for $t {
            const SIZE: usize = <$t>::BITS as usize;

            #[inline]
            fn get(&self, i: usize) -> bool {
                assert!(i < Self::SIZE, "bit {} out of range for a {} bit word", i, Self::SIZE);
                (*self >> i) & 1 == 1
            }

            #[inline]
            fn set(&mut self, i: usize, bit: bool) {
                assert!(i < Self::SIZE, "bit {} out of range for a {} bit word", i, Self::SIZE);
                if bit {
                    *self |= (1 as $t) << i;
                } else {
                    *self &= !((1 as $t) << i);
                }
            }

            #[inline]
            fn mismatches(&self, other: &Self) -> usize {
                (*self ^ *other).count_ones() as usize
            }
        }
    };
}

impl_word!(u8);
impl_word!(u16);
impl_word!(u32);
impl_word!(u64);

/// Compute the smallest amount of words of width `size` needed to fit `n` bits.
/// For example 9 bits need 2 bytes.
pub fn to_blocks(n: usize, size: usize) -> usize {
    (n + size - 1) / size
}

/// Read the `i`-th bit of a buffer, counting from bit 0 of the first word.
pub fn get_bit<W: Word>(buffer: &[W], i: usize) -> bool {
    buffer[i / W::SIZE].get(i % W::SIZE)
}

/// Set the `i`-th bit of a buffer, counting from bit 0 of the first word.
pub fn set_bit<W: Word>(buffer: &mut [W], i: usize, bit: bool) {
    buffer[i / W::SIZE].set(i % W::SIZE, bit)
}
