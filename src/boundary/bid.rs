//! Short post identifier (bid) decoding.
//!
//! A bid is the base-62 rendering of a numeric post id (mid), written in
//! groups of four characters from the least significant end. Each group
//! decodes to a number that is printed as (at least) seven decimal digits;
//! the concatenated digits form the mid.

use super::BoundaryError;

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const GROUP_LEN: usize = 4;

fn symbol_value(symbol: u8) -> Option<u64> {
    ALPHABET
        .iter()
        .position(|&c| c == symbol)
        .map(|position| position as u64)
}

/// Decodes a short post identifier into its numeric mid.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidIdentifier`] for empty input or symbols
/// outside the alphabet, and [`BoundaryError::Overflow`] when the decoded
/// digits do not fit in an `i64`.
///
/// # Example
///
/// ```
/// use weibo_downloader_core::boundary::bid_to_mid;
///
/// assert_eq!(bid_to_mid("z0JH2lOMb").unwrap(), 3_501_756_485_200_075);
/// ```
pub fn bid_to_mid(bid: &str) -> Result<i64, BoundaryError> {
    let bytes = bid.as_bytes();
    if bytes.is_empty() {
        return Err(BoundaryError::invalid_identifier(bid));
    }

    let first_group = match bytes.len() % GROUP_LEN {
        0 => GROUP_LEN,
        rem => rem,
    };

    let mut digits = String::with_capacity(bytes.len() * 2);
    let mut start = 0;
    let mut end = first_group;
    while start < bytes.len() {
        let mut value: u64 = 0;
        for &symbol in &bytes[start..end] {
            let symbol = symbol_value(symbol).ok_or_else(|| BoundaryError::invalid_identifier(bid))?;
            value = value * 62 + symbol;
        }
        digits.push_str(&format!("{value:07}"));
        start = end;
        end += GROUP_LEN;
    }

    digits
        .parse::<i64>()
        .map_err(|_| BoundaryError::overflow(bid))
}
