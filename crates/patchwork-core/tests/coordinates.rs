use patchwork_core::line_index::{line_range_to_char_range, offset_to_position, position_to_offset};
use patchwork_core::{CoordinateError, LineIndex, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TEXT: &str = "line1\nline2\nline3\n";

#[test]
fn test_round_trip_random_positions() {
    let alphabet = ['a', 'b', ' ', 'é', '你', '😀', '\n'];
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let len = rng.gen_range(0..200);
        let text: String = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        let index = LineIndex::from_text(&text);

        for line in 0..index.line_count() {
            let line_len = index.line_len(line).unwrap();
            for column in 0..=line_len {
                let offset = index.position_to_offset(line, column).unwrap();
                assert_eq!(
                    index.offset_to_position(offset).unwrap(),
                    Position::new(line, column),
                    "text {text:?}"
                );
            }
        }
    }
}

#[test]
fn test_line_ranges_include_their_separator() {
    assert_eq!(line_range_to_char_range(TEXT, 1, 1).unwrap(), 0..6);
    assert_eq!(line_range_to_char_range(TEXT, 2, 2).unwrap(), 6..12);
    assert_eq!(line_range_to_char_range(TEXT, 2, 3).unwrap(), 6..18);
    // The empty line after the final separator.
    assert_eq!(line_range_to_char_range(TEXT, 4, 4).unwrap(), 18..18);
    // Final line without a trailing separator.
    assert_eq!(line_range_to_char_range("a\nb", 2, 2).unwrap(), 2..3);
}

#[test]
fn test_line_range_errors() {
    assert!(matches!(
        line_range_to_char_range(TEXT, 5, 5),
        Err(CoordinateError::LineOutOfBounds { line: 5, .. })
    ));
    assert!(matches!(
        line_range_to_char_range(TEXT, 0, 1),
        Err(CoordinateError::LineOutOfBounds { line: 0, .. })
    ));
    assert_eq!(
        line_range_to_char_range(TEXT, 3, 2),
        Err(CoordinateError::InvertedLineRange { start: 3, end: 2 })
    );
}

#[test]
fn test_offset_after_line() {
    let index = LineIndex::from_text(TEXT);
    assert_eq!(index.offset_after_line(0).unwrap(), 0);
    assert_eq!(index.offset_after_line(1).unwrap(), 6);
    assert_eq!(index.offset_after_line(3).unwrap(), 18);
    assert!(index.offset_after_line(9).is_err());
}

#[test]
fn test_free_functions_and_bounds() {
    assert_eq!(offset_to_position(TEXT, 7).unwrap(), Position::new(1, 1));
    assert_eq!(position_to_offset(TEXT, 2, 5).unwrap(), 17);
    assert_eq!(
        offset_to_position(TEXT, 99),
        Err(CoordinateError::OffsetOutOfBounds { offset: 99, len: 18 })
    );
    assert!(matches!(
        position_to_offset(TEXT, 0, 6),
        Err(CoordinateError::ColumnOutOfBounds { .. })
    ));
}

#[test]
fn test_byte_and_utf16_conversion() {
    let index = LineIndex::from_text("é😀a");
    assert_eq!(index.char_to_byte(1).unwrap(), 2);
    assert_eq!(index.char_to_byte(2).unwrap(), 6);
    assert_eq!(index.byte_to_char(6).unwrap(), 2);
    assert_eq!(index.char_to_utf16(2).unwrap(), 3);
    assert_eq!(index.utf16_to_char(3).unwrap(), 2);
    assert!(index.char_to_utf16(4).is_err());
}
