//! Decoder for the dictionary-coded exercise payloads.
//!
//! A payload is a list of segments separated by [`SEGMENT_SEPARATOR`]:
//!
//! 1. `"."` or a dot-prefixed list of decimal code points (the "big" symbols);
//! 2. a literal run of single-character symbols;
//! 3. any number of chunks of base-90 codes. Chunk `k` (0-based) stores codes
//!    that are `k + 2` digits wide.
//!
//! Codes index a dictionary that starts with two sentinels followed by the big
//! and small symbols, and grows by one entry per decoded code, LZW style.
//! There is no encoder here: payloads are produced upstream.

use thiserror::Error;

pub const SEGMENT_SEPARATOR: char = '\u{1e}';

/// Digits of the positional encoding, in value order.
pub const ALPHABET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!#$%&'()*+,-./:;=?@^_`{|}~";

const BASE: u64 = 90;
const SENTINELS: [char; 2] = ['>', '<'];
const FIRST_CHUNK_WIDTH: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is missing its {0} segment")]
    MissingSegment(&'static str),

    #[error("invalid code point `{0}` in the symbol segment")]
    InvalidCodePoint(String),

    #[error("character {0:?} is not a digit of the payload alphabet")]
    InvalidDigit(char),

    #[error("chunk {chunk} holds {len} digits, which is not a multiple of its width {width}")]
    MisalignedChunk {
        chunk: usize,
        len: usize,
        width: usize,
    },

    #[error("chunk {chunk} holds a code too large to index any dictionary")]
    CodeOverflow { chunk: usize },

    #[error("code {index} at position {position} is outside the dictionary (size {size})")]
    UnknownIndex {
        index: usize,
        position: usize,
        size: usize,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Decompress `payload` back into its original text.
pub fn decode(payload: &str) -> Result<String> {
    let mut segments = payload.trim().split(SEGMENT_SEPARATOR);
    let bigs = segments
        .next()
        .ok_or(DecodeError::MissingSegment("symbol"))?;
    let smalls = segments
        .next()
        .ok_or(DecodeError::MissingSegment("literal"))?;

    let mut dictionary: Vec<String> = SENTINELS.iter().map(char::to_string).collect();
    dictionary.extend(parse_big_symbols(bigs)?);
    dictionary.extend(smalls.chars().map(String::from));

    let codes = read_codes(segments)?;
    tracing::trace!(
        codes = codes.len(),
        symbols = dictionary.len(),
        "decoding payload"
    );

    let mut out = String::new();
    for (position, &index) in codes.iter().enumerate() {
        let entry = dictionary
            .get(index)
            .cloned()
            .ok_or(DecodeError::UnknownIndex {
                index,
                position,
                size: dictionary.len(),
            })?;
        // The follower may be the entry created by this very step, which is
        // not in the dictionary yet: its first char is then `entry`'s.
        let lead = codes
            .get(position + 1)
            .and_then(|next| dictionary.get(*next))
            .unwrap_or(&entry)
            .chars()
            .next();

        let mut fresh = entry.clone();
        fresh.extend(lead);
        out.push_str(&entry);
        dictionary.push(fresh);
    }
    Ok(out)
}

fn parse_big_symbols(segment: &str) -> Result<Vec<String>> {
    if segment.is_empty() || segment == "." {
        return Ok(Vec::new());
    }
    let listed = segment.strip_prefix('.').unwrap_or(segment);
    listed
        .split('.')
        .map(|raw| {
            raw.parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .ok_or_else(|| DecodeError::InvalidCodePoint(raw.to_string()))
        })
        .collect()
}

fn read_codes<'a>(chunks: impl Iterator<Item = &'a str>) -> Result<Vec<usize>> {
    let mut codes = Vec::new();
    for (chunk_idx, chunk) in chunks.enumerate() {
        let width = FIRST_CHUNK_WIDTH + chunk_idx;
        let digits: Vec<char> = chunk.chars().collect();
        if digits.len() % width != 0 {
            return Err(DecodeError::MisalignedChunk {
                chunk: chunk_idx,
                len: digits.len(),
                width,
            });
        }
        for group in digits.chunks(width) {
            codes.push(read_code(group, chunk_idx)?);
        }
    }
    Ok(codes)
}

fn read_code(digits: &[char], chunk: usize) -> Result<usize> {
    let mut value: u64 = 0;
    for &c in digits {
        let digit = digit_value(c).ok_or(DecodeError::InvalidDigit(c))?;
        value = value
            .checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(DecodeError::CodeOverflow { chunk })?;
    }
    usize::try_from(value).map_err(|_| DecodeError::CodeOverflow { chunk })
}

fn digit_value(c: char) -> Option<u64> {
    ALPHABET
        .chars()
        .position(|digit| digit == c)
        .map(|position| position as u64)
}
