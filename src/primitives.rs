//! Curve-agnostic building blocks: zeroization, constant-time comparison,
//! and RFC 6979 deterministic nonce derivation.
//!
//! Everything here operates on plain byte buffers so it has no dependency on
//! any specific curve implementation; the curve-specific glue lives in
//! [`crate::keys`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Overwrites every byte of `buf` with zero using a write the optimizer
/// cannot elide. A no-op on an empty buffer.
pub fn zeroize_bytes(buf: &mut [u8]) {
    buf.zeroize();
}

/// Constant-time byte comparison. Returns `false` immediately on length
/// mismatch (length is not secret in this crate's use cases); otherwise the
/// comparison itself runs in time independent of the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes `bits2octets(h1)` per RFC 6979 §2.3.4: interpret `h1` as an
/// integer, reduce it modulo the curve order `n`, and re-encode it as a
/// `qlen`-byte big-endian string, where `qlen = n.len()`.
fn bits2octets(h1: &[u8], n: &[u8]) -> Vec<u8> {
    let qlen = n.len();
    let mut z1 = bits2int(h1, qlen * 8);
    if ge(&z1, n) {
        sub_in_place(&mut z1, n);
    }
    int2octets(&z1, qlen)
}

/// Interprets `bits` as a big-endian integer truncated (via right shift) to
/// at most `qlen_bits` bits, per RFC 6979 §2.3.2.
fn bits2int(bits: &[u8], qlen_bits: usize) -> Vec<u8> {
    let blen = bits.len() * 8;
    let mut v = bits.to_vec();
    if blen > qlen_bits {
        let shift = blen - qlen_bits;
        v = shift_right(&v, shift);
    }
    let out_len = qlen_bits.div_ceil(8);
    left_pad(&v, out_len)
}

fn int2octets(v: &[u8], qlen: usize) -> Vec<u8> {
    left_pad(v, qlen)
}

fn left_pad(v: &[u8], len: usize) -> Vec<u8> {
    if v.len() >= len {
        return v[v.len() - len..].to_vec();
    }
    let mut out = vec![0u8; len - v.len()];
    out.extend_from_slice(v);
    out
}

fn shift_right(v: &[u8], bits: usize) -> Vec<u8> {
    let byte_shift = bits / 8;
    let bit_shift = bits % 8;
    if byte_shift >= v.len() {
        return vec![0u8];
    }
    let mut out = v[..v.len() - byte_shift].to_vec();
    if bit_shift > 0 {
        let mut carry = 0u8;
        for b in out.iter_mut() {
            let new_carry = *b << (8 - bit_shift);
            *b = (*b >> bit_shift) | carry;
            carry = new_carry;
        }
    }
    out
}

fn ge(a: &[u8], b: &[u8]) -> bool {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    if a.len() != b.len() {
        return a.len() > b.len();
    }
    a >= b
}

fn strip_leading_zeros(v: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < v.len() - 1 && v[i] == 0 {
        i += 1;
    }
    &v[i..]
}

/// `a -= b` in place, assuming `a >= b` and equal length. Used only inside
/// `bits2octets`, where that precondition is checked by the caller.
fn sub_in_place(a: &mut [u8], b: &[u8]) {
    let mut borrow = 0i16;
    for i in (0..a.len()).rev() {
        let mut diff = a[i] as i16 - b[i] as i16 - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        a[i] = diff as u8;
    }
}

fn is_in_range(t: &[u8], n: &[u8]) -> bool {
    let t_stripped = strip_leading_zeros(t);
    if t_stripped.iter().all(|&b| b == 0) {
        return false; // t == 0
    }
    !ge(t, n)
}

/// Derives a deterministic ECDSA nonce `k ∈ [1, n-1]` from a private scalar
/// `d`, a message hash `h1`, and curve order `n`, following RFC 6979 §3.2
/// steps a-h using HMAC-SHA-256 as the hash function.
///
/// `d` must already be encoded as `n.len()` big-endian bytes (the caller is
/// responsible for the scalar-to-octet conversion in step a).
pub fn rfc6979_nonce(d: &[u8], h1: &[u8], n: &[u8]) -> Vec<u8> {
    let qlen = n.len();
    let x = d.to_vec();
    let h1_reduced = bits2octets(h1, n);

    let mut v = vec![0x01u8; 32];
    let mut k = vec![0x00u8; 32];

    let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
    mac.update(&v);
    mac.update(&[0x00]);
    mac.update(&x);
    mac.update(&h1_reduced);
    k = mac.finalize().into_bytes().to_vec();

    let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
    mac.update(&v);
    v = mac.finalize().into_bytes().to_vec();

    let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
    mac.update(&v);
    mac.update(&[0x01]);
    mac.update(&x);
    mac.update(&h1_reduced);
    k = mac.finalize().into_bytes().to_vec();

    let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
    mac.update(&v);
    v = mac.finalize().into_bytes().to_vec();

    loop {
        let mut t = Vec::new();
        while t.len() < qlen {
            let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
            mac.update(&v);
            v = mac.finalize().into_bytes().to_vec();
            t.extend_from_slice(&v);
        }
        let t = bits2int(&t[..qlen], qlen * 8);
        if is_in_range(&t, n) {
            return t;
        }
        let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
        mac.update(&v);
        mac.update(&[0x00]);
        k = mac.finalize().into_bytes().to_vec();

        let mut mac = HmacSha256::new_from_slice(&k).expect("HMAC accepts any key length");
        mac.update(&v);
        v = mac.finalize().into_bytes().to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroize_clears_buffer() {
        let mut buf = [1u8, 2, 3, 4];
        zeroize_bytes(&mut buf);
        assert_eq!(buf, [0, 0, 0, 0]);
    }

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn rfc6979_nonce_is_deterministic() {
        use sha2::Digest;

        let n = hex::decode(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        )
        .unwrap();
        let d = vec![0x01u8; 32];
        let h1 = Sha256::digest(b"sample").to_vec();

        let k1 = rfc6979_nonce(&d, &h1, &n);
        let k2 = rfc6979_nonce(&d, &h1, &n);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), n.len());
    }

    #[test]
    fn bits2int_truncates_longer_input() {
        let n = hex::decode(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        )
        .unwrap();
        let h1 = [0xffu8; 32];
        let reduced = bits2octets(&h1, &n);
        assert_eq!(reduced.len(), n.len());
    }
}
