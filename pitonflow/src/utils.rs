//! Utilities.

/// Returns ceiling log2.
pub const fn clog2(value: usize) -> usize {
    if value == 0 {
        0
    } else {
        usize::BITS as usize - (value - 1).leading_zeros() as usize
    }
}

/// Returns gray-coded value of a binary counter value.
pub const fn bin_to_gray(value: usize) -> usize { value ^ (value >> 1) }

/// Returns binary value of a gray-coded counter value.
pub const fn gray_to_bin(gray: usize) -> usize {
    let mut value = gray;
    let mut shift = gray >> 1;
    while shift != 0 {
        value ^= shift;
        shift >>= 1;
    }
    value
}

/// Returns bit-represented value of an integer, least significant bit first.
pub fn u64_to_bitvec(n: usize, value: u64) -> Vec<bool> {
    assert!(
        n >= 64 || value < (1u64 << n),
        "Width of Signal ({}) is too small to be converted from the value '{}'",
        n,
        value
    );
    (0..n).map(|i| if i >= 64 { false } else { (value & (1 << i)) != 0 }).collect::<Vec<_>>()
}

/// Returns the integer represented by bits, least significant bit first.
///
/// Returns `None` if a set bit does not fit in `u64`.
pub fn bitvec_to_u64(bits: &[bool]) -> Option<u64> {
    bits.iter().enumerate().try_fold(0u64, |acc, (i, bit)| match (bit, i < 64) {
        (false, _) => Some(acc),
        (true, true) => Some(acc | (1 << i)),
        (true, false) => None,
    })
}

/// Packs bits into bytes, least significant bit first. The last byte is zero-padded.
pub fn bitvec_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().enumerate().fold(0u8, |acc, (i, bit)| acc | (u8::from(*bit) << i)))
        .collect()
}

/// Ok or executing the given expression.
#[macro_export]
macro_rules! ok_or {
    ($e:expr, $err:expr) => {{
        match $e {
            Ok(r) => r,
            Err(_) => $err,
        }
    }};
}

/// Some or executing the given expression.
#[macro_export]
macro_rules! some_or {
    ($e:expr, $err:expr) => {{
        match $e {
            Some(r) => r,
            None => $err,
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2() {
        assert_eq!(clog2(1), 0);
        assert_eq!(clog2(3), 2);
        assert_eq!(clog2(4), 2);
        assert_eq!(clog2(5), 3);
    }

    #[test]
    fn gray_code_changes_one_bit_per_step() {
        for value in 0..64usize {
            let step = bin_to_gray(value) ^ bin_to_gray(value + 1);
            assert_eq!(step.count_ones(), 1);
            assert_eq!(gray_to_bin(bin_to_gray(value)), value);
        }
    }

    #[test]
    fn bitvec() {
        assert_eq!(u64_to_bitvec(4, 0b1010), vec![false, true, false, true]);
        assert_eq!(bitvec_to_u64(&[true, false, true]), Some(0b101));
        assert_eq!(bitvec_to_bytes(&[true, false, true]), vec![0b101]);
        assert_eq!(bitvec_to_bytes(&u64_to_bitvec(10, 0x2ff)), vec![0xff, 0x02]);
    }
}
