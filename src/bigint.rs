use std::cmp::Ordering;
use std::fmt;

/// Sign-magnitude arbitrary precision integer. Limbs are little-endian and
/// normalized so that the most significant limb is never zero; zero is never
/// negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    limbs: Vec<u32>,
}

pub(crate) fn normalize_len(limbs: &[u32]) -> usize {
    let mut idx = limbs.len();
    while idx > 0 {
        if limbs[idx - 1] != 0 {
            break;
        }
        idx -= 1;
    }
    idx
}

pub(crate) fn cmp_mag(a: &[u32], b: &[u32]) -> Ordering {
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return a[i].cmp(&b[i]);
        }
    }
    Ordering::Equal
}

fn add_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len + 1);
    let mut carry = 0u64;
    for i in 0..len {
        let av = a.get(i).copied().unwrap_or(0) as u64;
        let bv = b.get(i).copied().unwrap_or(0) as u64;
        let sum = av + bv + carry;
        out.push(sum as u32);
        carry = sum >> 32;
    }
    if carry != 0 {
        out.push(carry as u32);
    }
    out
}

// requires |a| >= |b|
fn sub_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0u32;
    for i in 0..a.len() {
        let bv = b.get(i).copied().unwrap_or(0);
        let (res1, overflow1) = a[i].overflowing_sub(bv);
        let (res2, overflow2) = res1.overflowing_sub(borrow);
        out.push(res2);
        borrow = (overflow1 as u32) | (overflow2 as u32);
    }
    out
}

fn mul_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = vec![0u32; a.len() + b.len()];
    for (i, &av) in a.iter().enumerate() {
        let mut carry = 0u64;
        for (j, &bv) in b.iter().enumerate() {
            let acc = out[i + j] as u64 + (av as u64) * (bv as u64) + carry;
            out[i + j] = acc as u32;
            carry = acc >> 32;
        }
        let mut k = i + b.len();
        while carry != 0 && k < out.len() {
            let acc = out[k] as u64 + carry;
            out[k] = acc as u32;
            carry = acc >> 32;
            k += 1;
        }
    }
    out
}

fn bit_len(limbs: &[u32]) -> usize {
    match limbs.last() {
        Some(top) => (limbs.len() - 1) * 32 + (32 - top.leading_zeros() as usize),
        None => 0,
    }
}

// Shift-subtract long division on magnitudes.
fn div_rem_mag(a: &[u32], b: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let mut quotient = vec![0u32; a.len()];
    let mut remainder: Vec<u32> = Vec::new();
    for bit in (0..bit_len(a)).rev() {
        // remainder = remainder * 2 + bit
        let mut carry = (a[bit / 32] >> (bit % 32)) & 1;
        for limb in remainder.iter_mut() {
            let next = *limb >> 31;
            *limb = (*limb << 1) | carry;
            carry = next;
        }
        if carry != 0 {
            remainder.push(carry);
        }
        if cmp_mag(&remainder, b) != Ordering::Less {
            remainder = sub_mag(&remainder, b);
            remainder.truncate(normalize_len(&remainder));
            quotient[bit / 32] |= 1 << (bit % 32);
        }
    }
    quotient.truncate(normalize_len(&quotient));
    (quotient, remainder)
}

fn digit_value(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'A'..=b'Z' => Some((c - b'A') as u32 + 10),
        b'a'..=b'z' => Some((c - b'a') as u32 + 10),
        _ => None,
    }
}

impl BigInt {
    fn from_parts(negative: bool, mut limbs: Vec<u32>) -> Self {
        limbs.truncate(normalize_len(&limbs));
        let negative = negative && !limbs.is_empty();
        BigInt { negative, limbs }
    }

    pub fn zero() -> Self {
        BigInt::default()
    }

    pub fn from_i64(value: i64) -> Self {
        let mag = value.unsigned_abs();
        BigInt::from_parts(value < 0, vec![mag as u32, (mag >> 32) as u32])
    }

    /// Accumulates `digits` in `base`, one digit at a time. Fails on any digit
    /// that is not valid for the base.
    pub fn from_digits(digits: &str, base: u32) -> Option<Self> {
        let mut out = BigInt::zero();
        for c in digits.bytes() {
            let v = digit_value(c).filter(|v| *v < base)?;
            out.mul_small(base);
            out.add_small(v);
        }
        Some(out)
    }

    pub fn from_hex(hex: &str, negative: bool) -> Option<Self> {
        let mut out = BigInt::from_digits(hex, 16)?;
        out.negative = negative && !out.limbs.is_empty();
        Some(out)
    }

    /// Little-endian magnitude bytes, the layout of Squeak's LargeIntegers.
    pub fn from_le_bytes(bytes: &[u8], negative: bool) -> Self {
        let limbs = bytes
            .chunks(4)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u32, |acc, (i, b)| acc | ((*b as u32) << (8 * i)))
            })
            .collect();
        BigInt::from_parts(negative, limbs)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.limbs.iter().flat_map(|l| l.to_le_bytes()).collect();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    pub fn mul_small(&mut self, m: u32) {
        let mut carry = 0u64;
        for limb in self.limbs.iter_mut() {
            let acc = (*limb as u64) * (m as u64) + carry;
            *limb = acc as u32;
            carry = acc >> 32;
        }
        if carry != 0 {
            self.limbs.push(carry as u32);
        }
        self.limbs.truncate(normalize_len(&self.limbs));
    }

    pub fn add_small(&mut self, v: u32) {
        let mut carry = v as u64;
        for limb in self.limbs.iter_mut() {
            if carry == 0 {
                break;
            }
            let acc = *limb as u64 + carry;
            *limb = acc as u32;
            carry = acc >> 32;
        }
        if carry != 0 {
            self.limbs.push(carry as u32);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn neg(&self) -> Self {
        BigInt::from_parts(!self.negative, self.limbs.clone())
    }

    pub fn abs(&self) -> Self {
        BigInt::from_parts(false, self.limbs.clone())
    }

    /// Upper-case hex digits of the magnitude, without sign or leading zeros.
    pub fn to_hex(&self) -> String {
        let mut out = String::new();
        for limb in self.limbs.iter().rev() {
            if out.is_empty() {
                out.push_str(&format!("{:X}", limb));
            } else {
                out.push_str(&format!("{:08X}", limb));
            }
        }
        if out.is_empty() {
            out.push('0');
        }
        out
    }

    pub fn to_i64(&self) -> Option<i64> {
        if self.limbs.len() > 2 {
            return None;
        }
        let mut mag = 0u64;
        for (i, limb) in self.limbs.iter().enumerate() {
            mag |= (*limb as u64) << (32 * i);
        }
        if self.negative {
            if mag <= i64::MAX as u64 + 1 {
                return Some((mag as i64).wrapping_neg());
            }
            None
        } else {
            i64::try_from(mag).ok()
        }
    }

    pub fn to_f64(&self) -> f64 {
        let mag = self
            .limbs
            .iter()
            .rev()
            .fold(0f64, |acc, limb| acc * 4294967296.0 + *limb as f64);
        if self.negative { -mag } else { mag }
    }

    pub fn add(&self, other: &BigInt) -> BigInt {
        if self.negative == other.negative {
            return BigInt::from_parts(self.negative, add_mag(&self.limbs, &other.limbs));
        }
        match cmp_mag(&self.limbs, &other.limbs) {
            Ordering::Less => {
                BigInt::from_parts(other.negative, sub_mag(&other.limbs, &self.limbs))
            }
            _ => BigInt::from_parts(self.negative, sub_mag(&self.limbs, &other.limbs)),
        }
    }

    pub fn sub(&self, other: &BigInt) -> BigInt {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &BigInt) -> BigInt {
        BigInt::from_parts(
            self.negative != other.negative,
            mul_mag(&self.limbs, &other.limbs),
        )
    }

    /// Truncating division (`quo:` and `rem:`). `None` when dividing by zero.
    pub fn quo_rem(&self, other: &BigInt) -> Option<(BigInt, BigInt)> {
        if other.is_zero() {
            return None;
        }
        let (q, r) = div_rem_mag(&self.limbs, &other.limbs);
        Some((
            BigInt::from_parts(self.negative != other.negative, q),
            BigInt::from_parts(self.negative, r),
        ))
    }

    /// Floored division (`//` and `\\`).
    pub fn div_mod(&self, other: &BigInt) -> Option<(BigInt, BigInt)> {
        let (q, r) = self.quo_rem(other)?;
        if !r.is_zero() && r.negative != other.negative {
            let one = BigInt::from_i64(1);
            return Some((q.sub(&one), r.add(other)));
        }
        Some((q, r))
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => cmp_mag(&self.limbs, &other.limbs),
            (true, true) => cmp_mag(&other.limbs, &self.limbs),
        }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BigInt {
    // Decimal, by repeated division by 10^9.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let chunk = [1_000_000_000u32];
        let mut parts = Vec::new();
        let mut rest = self.limbs.clone();
        while !rest.is_empty() {
            let (q, r) = div_rem_mag(&rest, &chunk);
            parts.push(r.first().copied().unwrap_or(0));
            rest = q;
        }
        if self.negative {
            write!(f, "-")?;
        }
        let mut first = true;
        for part in parts.iter().rev() {
            if first {
                write!(f, "{}", part)?;
                first = false;
            } else {
                write!(f, "{:09}", part)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn digits_in_radix() {
        let n = BigInt::from_digits("1111", 2).unwrap();
        assert_eq!(n.to_i64(), Some(15));
        assert!(BigInt::from_digits("12", 2).is_none());
        let n = BigInt::from_digits("FF", 16).unwrap();
        assert_eq!(n.to_hex(), "FF");
    }

    #[test]
    fn hex_of_large_values() {
        let mut n = BigInt::from_digits("1", 10).unwrap();
        for _ in 0..20 {
            n.mul_small(10);
        }
        assert_eq!(n.to_string(), "100000000000000000000");
        assert_eq!(n.to_hex(), "56BC75E2D63100000");
        assert_eq!(BigInt::from_hex("56BC75E2D63100000", false), Some(n));
    }

    #[test]
    fn signed_arithmetic() {
        let a = BigInt::from_i64(1 << 40);
        let b = BigInt::from_i64(-(1 << 41));
        assert_eq!(a.add(&b).to_i64(), Some(-(1 << 40)));
        assert_eq!(a.sub(&b).to_i64(), Some(3 << 40));
        assert_eq!(a.mul(&b).to_string(), "-2417851639229258349412352");
        assert!(b < a);
    }

    #[test]
    fn floored_and_truncated_division() {
        let a = BigInt::from_i64(-7);
        let b = BigInt::from_i64(2);
        let (q, r) = a.quo_rem(&b).unwrap();
        assert_eq!((q.to_i64(), r.to_i64()), (Some(-3), Some(-1)));
        let (q, r) = a.div_mod(&b).unwrap();
        assert_eq!((q.to_i64(), r.to_i64()), (Some(-4), Some(1)));
        assert!(a.quo_rem(&BigInt::zero()).is_none());
    }

    #[test]
    fn byte_layout() {
        let n = BigInt::from_i64(0x1_0203_0405);
        assert_eq!(n.to_le_bytes(), vec![5, 4, 3, 2, 1]);
        assert_eq!(BigInt::from_le_bytes(&[5, 4, 3, 2, 1], false), n);
    }
}
