//! Bit-level prefix scans over a table cursor.

use crate::Result;
use subcoin_kv::Cursor;

/// Returns the number of leading bytes covered by `fixed_bits` and the mask
/// selecting the significant bits of the last of those bytes.
pub fn bytes_mask(fixed_bits: usize) -> (usize, u8) {
    let fixed_bytes = fixed_bits.div_ceil(8);
    let partial = fixed_bits % 8;
    let mask = if partial == 0 { 0xff } else { 0xffu8 << (8 - partial) };
    (fixed_bytes, mask)
}

/// Visits every entry whose key shares its first `fixed_bits` bits with `start_key`,
/// starting at the first key greater than or equal to `start_key`.
///
/// The scan stops at the first key outside the prefix, when `visit` returns
/// `false`, or on the first error. `fixed_bits = 0` visits the rest of the table.
pub fn walk<C, F>(cursor: &mut C, start_key: &[u8], fixed_bits: usize, mut visit: F) -> Result<()>
where
    C: Cursor,
    F: FnMut(&[u8], &[u8]) -> Result<bool>,
{
    let (fixed_bytes, mask) = bytes_mask(fixed_bits);
    if start_key.len() < fixed_bytes {
        return Ok(());
    }

    let matches = |key: &[u8]| {
        if fixed_bits == 0 {
            return true;
        }
        key.len() >= fixed_bytes
            && key[..fixed_bytes - 1] == start_key[..fixed_bytes - 1]
            && key[fixed_bytes - 1] & mask == start_key[fixed_bytes - 1] & mask
    };

    let mut entry = cursor.seek(start_key)?;
    while let Some((key, value)) = entry {
        if !matches(&key) || !visit(&key, &value)? {
            break;
        }
        entry = cursor.next()?;
    }

    Ok(())
}
