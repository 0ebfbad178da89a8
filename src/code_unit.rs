//! Code-unit abstraction
//!
//! The buffer is parameterized over the width of one code unit: UTF-8
//! bytes (the default), UTF-16 code units, or UTF-32 code units. The
//! width is a build-time choice via the `utf16`/`utf32` cargo features;
//! offsets and lengths everywhere in this crate are measured in code
//! units of the chosen width. A "character" is one code unit; no
//! grapheme or surrogate handling happens at this layer.

#[cfg(all(feature = "utf16", feature = "utf32"))]
compile_error!("features `utf16` and `utf32` are mutually exclusive");

/// One element of the document text in the configured encoding.
#[cfg(feature = "utf16")]
pub type CodeUnit = u16;

/// One element of the document text in the configured encoding.
#[cfg(feature = "utf32")]
pub type CodeUnit = u32;

/// One element of the document text in the configured encoding.
#[cfg(not(any(feature = "utf16", feature = "utf32")))]
pub type CodeUnit = u8;

/// Line feed.
pub const LF: CodeUnit = b'\n' as CodeUnit;

/// Carriage return.
pub const CR: CodeUnit = b'\r' as CodeUnit;

/// The null code unit, returned by walkers and `at` past the end.
pub const NUL: CodeUnit = 0;

/// Encode a string into code units of the configured width.
#[cfg(feature = "utf16")]
pub fn encode(text: &str) -> Vec<CodeUnit> {
    text.encode_utf16().collect()
}

/// Encode a string into code units of the configured width.
#[cfg(feature = "utf32")]
pub fn encode(text: &str) -> Vec<CodeUnit> {
    text.chars().map(|c| c as u32).collect()
}

/// Encode a string into code units of the configured width.
#[cfg(not(any(feature = "utf16", feature = "utf32")))]
pub fn encode(text: &str) -> Vec<CodeUnit> {
    text.as_bytes().to_vec()
}

/// Decode code units back into a `String`, lossily replacing invalid
/// sequences.
#[cfg(feature = "utf16")]
pub fn decode(units: &[CodeUnit]) -> String {
    String::from_utf16_lossy(units)
}

/// Decode code units back into a `String`, lossily replacing invalid
/// sequences.
#[cfg(feature = "utf32")]
pub fn decode(units: &[CodeUnit]) -> String {
    units
        .iter()
        .map(|&u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decode code units back into a `String`, lossily replacing invalid
/// sequences.
#[cfg(not(any(feature = "utf16", feature = "utf32")))]
pub fn decode(units: &[CodeUnit]) -> String {
    String::from_utf8_lossy(units).into_owned()
}
