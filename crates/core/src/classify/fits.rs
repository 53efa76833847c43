//! Minimal FITS primary-header reader.
//!
//! Reads only the primary header: 2880-byte blocks of 80-byte ASCII cards,
//! terminated by an `END` card. The data units that follow are never read.
//! Files in compressed storage form are decoded transparently.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::discover::GZ_SUFFIX;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Headers larger than this are not legitimate pipeline inputs.
const MAX_HEADER_BLOCKS: usize = 64;

/// Outcome of attempting to read a header.
#[derive(Debug)]
pub(crate) enum HeaderRead {
    Ok(FitsHeader),
    /// The file is empty, not a FITS file, or truncated mid-header.
    CorruptOrEmpty(String),
}

/// Parsed key/value cards of a primary header.
#[derive(Debug, Clone, Default)]
pub struct FitsHeader {
    cards: Vec<(String, String)>,
}

impl FitsHeader {
    /// Value of the first card with the given keyword, if present.
    pub fn value(&self, keyword: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|(key, _)| key == keyword)
            .map(|(_, value)| value.as_str())
    }

    /// Integer value of a card, if present and parseable.
    pub fn int_value(&self, keyword: &str) -> Option<i64> {
        self.value(keyword).and_then(|v| v.parse().ok())
    }
}

/// Reads the primary header of a FITS file, gz-transparently.
///
/// Returns `Ok(None)` when the file is empty, not FITS, or truncated (the
/// corrupt-or-empty condition); `Err` only for genuine I/O failures.
pub fn read_primary_header(path: &Path) -> std::io::Result<Option<FitsHeader>> {
    match read_header_inner(path)? {
        HeaderRead::Ok(header) => Ok(Some(header)),
        HeaderRead::CorruptOrEmpty(reason) => {
            tracing::debug!("unreadable header in {}: {}", path.display(), reason);
            Ok(None)
        }
    }
}

fn read_header_inner(path: &Path) -> std::io::Result<HeaderRead> {
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(GZ_SUFFIX) {
        parse_header(GzDecoder::new(file))
    } else {
        parse_header(file)
    }
}

fn parse_header<R: Read>(mut reader: R) -> std::io::Result<HeaderRead> {
    let mut cards = Vec::new();
    let mut block = [0u8; BLOCK_SIZE];

    for block_idx in 0..MAX_HEADER_BLOCKS {
        match read_block(&mut reader, &mut block) {
            Ok(n) if n == BLOCK_SIZE => {}
            Ok(0) if block_idx == 0 => {
                return Ok(HeaderRead::CorruptOrEmpty("empty file".to_string()));
            }
            Ok(_) => {
                return Ok(HeaderRead::CorruptOrEmpty(
                    "header truncated before END card".to_string(),
                ));
            }
            // A bad deflate stream surfaces as an invalid/unexpected-EOF read.
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::InvalidInput
                        | std::io::ErrorKind::InvalidData
                        | std::io::ErrorKind::UnexpectedEof
                ) =>
            {
                return Ok(HeaderRead::CorruptOrEmpty(format!("undecodable stream: {e}")));
            }
            Err(e) => return Err(e),
        }

        if block_idx == 0 && !block.starts_with(b"SIMPLE") && !block.starts_with(b"XTENSION") {
            return Ok(HeaderRead::CorruptOrEmpty("missing SIMPLE card".to_string()));
        }

        for card in block.chunks_exact(CARD_SIZE) {
            let keyword = String::from_utf8_lossy(&card[..8]).trim().to_string();
            if keyword == "END" {
                return Ok(HeaderRead::Ok(FitsHeader { cards }));
            }
            if let Some(value) = parse_card_value(card) {
                cards.push((keyword, value));
            }
        }
    }

    Ok(HeaderRead::CorruptOrEmpty(
        "header exceeds maximum block count".to_string(),
    ))
}

/// Reads up to one block, returning the number of bytes actually read.
fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_SIZE]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        let n = reader.read(&mut block[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Extracts the value field from a `KEYWORD = value / comment` card.
fn parse_card_value(card: &[u8]) -> Option<String> {
    if card.len() < 10 || &card[8..10] != b"= " {
        return None;
    }
    let raw = String::from_utf8_lossy(&card[10..]).to_string();
    let trimmed = raw.trim_start();
    if let Some(rest) = trimmed.strip_prefix('\'') {
        // Quoted string value; a doubled quote is an escaped quote.
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        Some(value.trim_end().to_string())
    } else {
        // Numeric or logical value, possibly followed by a comment.
        let value = trimmed.split('/').next().unwrap_or("").trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fits::{fits_with_cards, write_fits, write_fits_gz};
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_card() {
        let card = format!("{:<80}", "EXPTYPE = 'EXTERNAL/SCI'       / exposure type");
        assert_eq!(parse_card_value(card.as_bytes()).as_deref(), Some("EXTERNAL/SCI"));
    }

    #[test]
    fn test_parse_numeric_card() {
        let card = format!("{:<80}", "PROPOSID=                12345 / program id");
        assert_eq!(parse_card_value(card.as_bytes()).as_deref(), Some("12345"));
    }

    #[test]
    fn test_parse_comment_card_has_no_value() {
        let card = format!("{:<80}", "COMMENT   this is a comment");
        assert_eq!(parse_card_value(card.as_bytes()), None);
    }

    #[test]
    fn test_binary_garbage_card_does_not_panic() {
        let mut card = vec![0xFFu8; 80];
        card[8] = b'=';
        card[9] = b' ';
        let _ = parse_card_value(&card);
    }

    #[test]
    fn test_read_header_plain() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.fits");
        write_fits(&path, &[("EXPTYPE", "EXTERNAL/SCI")]);

        let header = read_primary_header(&path).unwrap().unwrap();
        assert_eq!(header.value("EXPTYPE"), Some("EXTERNAL/SCI"));
        assert_eq!(header.value("MISSING"), None);
    }

    #[test]
    fn test_read_header_gz() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.fits.gz");
        write_fits_gz(&path, &[("PROPOSID", "12345")]);

        let header = read_primary_header(&path).unwrap().unwrap();
        assert_eq!(header.int_value("PROPOSID"), Some(12345));
    }

    #[test]
    fn test_empty_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.fits");
        std::fs::write(&path, b"").unwrap();

        assert!(read_primary_header(&path).unwrap().is_none());
    }

    #[test]
    fn test_non_fits_bytes_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("junk.fits");
        std::fs::write(&path, vec![0u8; BLOCK_SIZE]).unwrap();

        assert!(read_primary_header(&path).unwrap().is_none());
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trunc.fits");
        let full = fits_with_cards(&[("EXPTYPE", "EXTERNAL/SCI")]);
        std::fs::write(&path, &full[..100]).unwrap();

        assert!(read_primary_header(&path).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.fits");
        assert!(read_primary_header(&path).is_err());
    }
}
