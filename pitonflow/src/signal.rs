//! Bit-representable values.

use std::fmt;

use arrayvec::ArrayVec;

use crate::*;

/// Bit-representable values.
///
/// Every value that crosses a physical wire is a `Signal`: it has a fixed width and converts to and from a vector of
/// bits, least significant bit first.
pub trait Signal: 'static + fmt::Debug + Clone {
    /// Signal's bit width.
    ///
    /// # Note
    ///
    /// `Self::WIDTH` and `self.transl().len()` should be equal.
    const WIDTH: usize;

    /// Translates the value into its bits.
    fn transl(self) -> Vec<bool>;

    /// Reconstructs a value from its bits.
    ///
    /// Returns `None` if the length of `bits` is not `Self::WIDTH` or the bits are not a valid encoding.
    fn from_bits(bits: &[bool]) -> Option<Self>;
}

impl Signal for () {
    const WIDTH: usize = 0;

    fn transl(self) -> Vec<bool> { vec![] }

    fn from_bits(bits: &[bool]) -> Option<Self> { bits.is_empty().then_some(()) }
}

impl Signal for bool {
    const WIDTH: usize = 1;

    fn transl(self) -> Vec<bool> { vec![self] }

    fn from_bits(bits: &[bool]) -> Option<Self> {
        match bits {
            [bit] => Some(*bit),
            _ => None,
        }
    }
}

macro_rules! impl_signal_uint {
    ($($t:ty),*) => {
        $(
            impl Signal for $t {
                const WIDTH: usize = <$t>::BITS as usize;

                fn transl(self) -> Vec<bool> { u64_to_bitvec(Self::WIDTH, u64::from(self)) }

                fn from_bits(bits: &[bool]) -> Option<Self> {
                    if bits.len() != Self::WIDTH {
                        return None;
                    }
                    <$t>::try_from(bitvec_to_u64(bits)?).ok()
                }
            }
        )*
    };
}

impl_signal_uint!(u8, u16, u32, u64);

impl<V: Signal, const N: usize> Signal for [V; N] {
    const WIDTH: usize = V::WIDTH * N;

    fn transl(self) -> Vec<bool> { self.into_iter().flat_map(V::transl).collect() }

    fn from_bits(bits: &[bool]) -> Option<Self> {
        if bits.len() != Self::WIDTH {
            return None;
        }
        if V::WIDTH == 0 {
            return (0..N).map(|_| V::from_bits(&[])).collect::<Option<ArrayVec<V, N>>>()?.into_inner().ok();
        }
        bits.chunks(V::WIDTH).map(V::from_bits).collect::<Option<ArrayVec<V, N>>>()?.into_inner().ok()
    }
}

/// `N`-bit unsigned value, `N <= 64`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bits<const N: usize>(u64);

impl<const N: usize> Bits<N> {
    const MASK: u64 = {
        assert!(N <= 64, "Bits wider than 64 are not supported");
        if N == 0 {
            0
        } else if N == 64 {
            u64::MAX
        } else {
            (1 << N) - 1
        }
    };

    /// Creates a new value, truncated to `N` bits.
    pub const fn new(value: u64) -> Self { Self(value & Self::MASK) }

    /// Creates a new value, or `None` if `value` does not fit in `N` bits.
    pub const fn try_new(value: u64) -> Option<Self> {
        if value & !Self::MASK == 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the value.
    pub const fn value(self) -> u64 { self.0 }
}

impl<const N: usize> fmt::Debug for Bits<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}'h{:x}", N, self.0) }
}

impl<const N: usize> fmt::Display for Bits<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:#x}", self.0) }
}

impl<const N: usize> From<Bits<N>> for u64 {
    fn from(value: Bits<N>) -> Self { value.0 }
}

impl<const N: usize> Signal for Bits<N> {
    const WIDTH: usize = N;

    fn transl(self) -> Vec<bool> { u64_to_bitvec(N, self.0) }

    fn from_bits(bits: &[bool]) -> Option<Self> {
        if bits.len() != N {
            return None;
        }
        Self::try_new(bitvec_to_u64(bits)?)
    }
}
