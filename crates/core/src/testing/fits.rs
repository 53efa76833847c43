//! Minimal FITS file builders for tests.

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Builds a one-block FITS file with a primary header carrying the given
/// keyword/value cards. Numeric values are written bare, everything else
/// quoted.
pub fn fits_with_cards(cards: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    push_card(&mut out, "SIMPLE  =                    T");
    for (keyword, value) in cards {
        let card = if value.parse::<i64>().is_ok() {
            format!("{:<8}= {:>20}", keyword, value)
        } else {
            format!("{:<8}= '{}'", keyword, value)
        };
        push_card(&mut out, &card);
    }
    push_card(&mut out, "END");
    while out.len() % BLOCK_SIZE != 0 {
        out.push(b' ');
    }
    out
}

fn push_card(out: &mut Vec<u8>, content: &str) {
    let mut card = content.as_bytes().to_vec();
    card.resize(CARD_SIZE, b' ');
    out.extend_from_slice(&card);
}

/// Writes an uncompressed FITS file.
pub fn write_fits(path: &Path, cards: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture directory");
    }
    std::fs::write(path, fits_with_cards(cards)).expect("failed to write fixture");
}

/// Writes a gzip-compressed FITS file.
pub fn write_fits_gz(path: &Path, cards: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture directory");
    }
    let file = std::fs::File::create(path).expect("failed to create fixture");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(&fits_with_cards(cards))
        .expect("failed to write gz fixture");
    encoder.finish().expect("failed to finish gz fixture");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_block_aligned() {
        let bytes = fits_with_cards(&[("EXPTYPE", "EXTERNAL/SCI")]);
        assert_eq!(bytes.len() % BLOCK_SIZE, 0);
        assert!(bytes.starts_with(b"SIMPLE"));
    }

    #[test]
    fn test_numeric_values_written_bare() {
        let bytes = fits_with_cards(&[("PROPOSID", "12345")]);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("PROPOSID="));
        assert!(!text.contains("'12345'"));
    }
}
