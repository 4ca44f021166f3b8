//! Conversions between Rust strings and the wide-character buffers used by
//! Windows APIs.
//!
//! Kernel interfaces hand strings back in two shapes: NUL-terminated wide
//! buffers and length-prefixed wide buffers without a terminator. Both end
//! up here as `[u16]` slices; conversion stops at the first NUL if one is
//! present and otherwise consumes the whole slice.

pub fn u16_buffer_to_string<T: AsRef<[u16]>>(buffer: T) -> String {
    let buffer = buffer.as_ref();

    let len = buffer.iter().take_while(|&&unit| unit != 0).count();

    String::from_utf16_lossy(buffer.get(..len).unwrap_or(buffer))
}

pub fn string_to_u16_buffer<T: AsRef<str>>(string: T) -> Vec<u16> {
    string.as_ref().encode_utf16().chain(Some(0)).collect()
}

/// Case-insensitive comparison of a wide buffer against an ASCII reference
/// string. Device and object paths are ASCII, so non-ASCII input simply
/// compares unequal.
pub fn u16_buffer_eq_ignore_ascii_case<T: AsRef<[u16]>>(buffer: T, reference: &str) -> bool {
    let buffer = buffer.as_ref();

    buffer.len() == reference.len()
        && buffer
            .iter()
            .zip(reference.bytes())
            .all(|(&unit, byte)| match u8::try_from(unit) {
                Ok(unit) => unit.eq_ignore_ascii_case(&byte),
                Err(_) => false,
            })
}
