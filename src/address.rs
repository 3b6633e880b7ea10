//! Address literal parsing.
//!
//! Addresses are compared as unsigned 32-bit integers in network (big-endian)
//! order: `1.2.3.4` is `0x0102_0304`. Database fields are little-endian on
//! disk; see [`crate::bytes`] for that side of the conversion.

use std::net::Ipv4Addr;

/// The character standing in for an unknown octet digit.
pub const WILDCARD: u8 = b'*';

/// The digit a wildcard is read as.
const WILDCARD_DIGIT: u8 = b'1';

/// Convert dotted-quad octets to the comparable big-endian integer.
#[inline]
pub fn from_octets(octets: [u8; 4]) -> u32 {
    u32::from_be_bytes(octets)
}

/// Parse an address literal into its big-endian integer value.
///
/// Every `*` is first read as `1`, then the literal is parsed as a strict
/// dotted quad. If that fails and the literal is a plain decimal numeral, the
/// numeral itself is the address value. Anything else is `None`.
///
/// ```
/// use qqwrysed::address::parse_literal;
///
/// assert_eq!(parse_literal(b"1.1.1.*"), Some(0x0101_0101));
/// assert_eq!(parse_literal(b"16777217"), Some(0x0100_0001));
/// assert_eq!(parse_literal(b"1.1.1.256"), None);
/// ```
pub fn parse_literal(literal: &[u8]) -> Option<u32> {
    let mut unmasked = [0u8; 15];
    if literal.len() <= unmasked.len() {
        let unmasked = &mut unmasked[..literal.len()];
        for (dst, &src) in unmasked.iter_mut().zip(literal) {
            *dst = if src == WILDCARD { WILDCARD_DIGIT } else { src };
        }
        if let Some(ip) = parse_dotted_quad(unmasked) {
            return Some(from_octets(ip.octets()));
        }
    }
    parse_decimal(literal)
}

/// Parse a strict dotted quad.
///
/// Each octet must be 0-255 without leading zeros.
#[inline]
pub fn parse_dotted_quad(bytes: &[u8]) -> Option<Ipv4Addr> {
    if bytes.len() < 7 || bytes.len() > 15 {
        return None;
    }
    let mut octets = [0u8; 4];
    let mut octet_idx = 0;
    let mut current_val = 0u16;
    let mut digits_in_octet = 0;
    for &b in bytes {
        match b {
            b'.' => {
                if digits_in_octet == 0 || octet_idx == 3 {
                    return None;
                }
                octets[octet_idx] = current_val as u8;
                octet_idx += 1;
                current_val = 0;
                digits_in_octet = 0;
            }
            b'0'..=b'9' => {
                if digits_in_octet > 0 && current_val == 0 {
                    return None;
                }
                current_val = current_val * 10 + u16::from(b - b'0');
                if current_val > 255 {
                    return None;
                }
                digits_in_octet += 1;
            }
            _ => return None,
        }
    }
    if octet_idx != 3 || digits_in_octet == 0 {
        return None;
    }
    octets[3] = current_val as u8;
    Some(Ipv4Addr::from(octets))
}

/// Parse a plain decimal numeral that fits in 32 bits.
fn parse_decimal(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
