//! Cursor helpers for the hand-packed schemas.
//!
//! All multi-byte fields are little-endian. Strings are a u16 length
//! followed by UTF-8 bytes. Reads are bounds-checked so a truncated
//! frame surfaces as a decode error instead of a panic.

use bytes::BufMut;

use crate::peer::DecodeError;

pub(super) fn take_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
    let (&first, rest) = buf
        .split_first()
        .ok_or_else(|| DecodeError::Malformed("unexpected end of payload".into()))?;
    *buf = rest;
    Ok(first)
}

pub(super) fn take_u16(buf: &mut &[u8]) -> Result<u16, DecodeError> {
    Ok(u16::from_le_bytes(take_array::<2>(buf)?))
}

pub(super) fn take_u32(buf: &mut &[u8]) -> Result<u32, DecodeError> {
    Ok(u32::from_le_bytes(take_array::<4>(buf)?))
}

pub(super) fn take_f32(buf: &mut &[u8]) -> Result<f32, DecodeError> {
    Ok(f32::from_le_bytes(take_array::<4>(buf)?))
}

pub(super) fn take_bool(buf: &mut &[u8]) -> Result<bool, DecodeError> {
    Ok(take_u8(buf)? != 0)
}

pub(super) fn take_string(buf: &mut &[u8]) -> Result<String, DecodeError> {
    let len = take_u16(buf)? as usize;
    if buf.len() < len {
        return Err(DecodeError::Malformed(format!(
            "string of {len} bytes overruns payload",
        )));
    }
    let (bytes, rest) = buf.split_at(len);
    *buf = rest;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| DecodeError::Malformed("string is not UTF-8".into()))
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    if buf.len() < N {
        return Err(DecodeError::Malformed("unexpected end of payload".into()));
    }
    let (bytes, rest) = buf.split_at(N);
    *buf = rest;
    Ok(bytes.try_into().expect("split_at returned N bytes"))
}

pub(super) fn put_string(out: &mut Vec<u8>, value: &str) {
    debug_assert!(value.len() <= u16::MAX as usize);
    #[allow(clippy::cast_possible_truncation)]
    out.put_u16_le(value.len() as u16);
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_roundtrip() {
        let mut out = Vec::new();
        put_string(&mut out, "anim_wave_01");
        let mut cursor = out.as_slice();
        assert_eq!(take_string(&mut cursor).unwrap(), "anim_wave_01");
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_truncated_string_is_an_error() {
        let mut cursor: &[u8] = &[10, 0, b'a'];
        assert!(take_string(&mut cursor).is_err());
    }

    #[test]
    fn test_truncated_scalar_is_an_error() {
        let mut cursor: &[u8] = &[1, 2];
        assert!(take_u32(&mut cursor).is_err());
    }
}
