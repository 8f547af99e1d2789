//! Script integers: minimally encoded little-endian sign-magnitude numbers

use crate::interpreter::ScriptError;

/// Default operand width of arithmetic opcodes
pub const DEFAULT_MAX_NUM_SIZE: usize = 4;

/// Operand width of the lock-time opcodes
pub const LOCKTIME_MAX_NUM_SIZE: usize = 5;

/// Decode a stack element as an integer of at most `max_size` bytes
pub fn decode(data: &[u8], require_minimal: bool, max_size: usize) -> Result<i64, ScriptError> {
    if data.len() > max_size {
        return Err(ScriptError::NumOverflow);
    }
    if require_minimal && !is_minimally_encoded(data) {
        return Err(ScriptError::NumNonMinimal);
    }
    if data.is_empty() {
        return Ok(0);
    }
    let mut result: i64 = 0;
    for (i, byte) in data.iter().enumerate() {
        result |= (*byte as i64) << (8 * i);
    }
    let last = data[data.len() - 1];
    if last & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (data.len() - 1)));
        return Ok(-(result & mask));
    }
    Ok(result)
}

/// Encode an integer in the minimal form
pub fn encode(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut abs = value.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    // Sign bit goes in the last byte, or in an extra byte if that one is already in use
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

/// No superfluous zero (or negative-zero) most significant byte
pub fn is_minimally_encoded(data: &[u8]) -> bool {
    match data.last() {
        None => true,
        Some(last) if last & 0x7f == 0 => data.len() > 1 && data[data.len() - 2] & 0x80 != 0,
        Some(_) => true,
    }
}

/// Truthiness of a stack element; negative zero is false
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, byte) in data.iter().enumerate() {
        if *byte != 0 {
            return !(i == data.len() - 1 && *byte == 0x80);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(0), Vec::<u8>::new());
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(-1), vec![0x81]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x80, 0x00]);
        assert_eq!(encode(-128), vec![0x80, 0x80]);
        assert_eq!(encode(255), vec![0xff, 0x00]);
        assert_eq!(encode(256), vec![0x00, 0x01]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        for v in [0i64, 1, -1, 127, 128, -128, 255, -255, 32767, -32768, 0x7fff_ffff, -0x7fff_ffff] {
            assert_eq!(decode(&encode(v), true, 4).unwrap(), v);
        }
    }

    #[test]
    fn test_overflow_and_minimality() {
        assert_eq!(decode(&[1, 2, 3, 4, 5], false, 4), Err(ScriptError::NumOverflow));
        assert!(decode(&[1, 2, 3, 4, 5], false, 5).is_ok());
        assert_eq!(decode(&[0x01, 0x00], true, 4), Err(ScriptError::NumNonMinimal));
        assert_eq!(decode(&[0x01, 0x00], false, 4), Ok(1));
        assert!(decode(&[0x80, 0x00], true, 4).is_ok());
        assert_eq!(decode(&[0x80], true, 4), Err(ScriptError::NumNonMinimal));
    }

    #[test]
    fn test_cast_to_bool() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00, 0x00]));
        assert!(!cast_to_bool(&[0x00, 0x80]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x01]));
    }
}
