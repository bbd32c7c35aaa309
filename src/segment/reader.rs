//! Plain-text segment reader
//!
//! One segment per line: `x0 y0 x1 y1 [origin]`
//! Blank lines and `#` comments are skipped; the line number is the id.

use std::collections::BTreeMap;
use std::io::BufRead;

use super::{Point, Segment, SegmentId, SegmentPool};
use crate::NetworkError;

/// Read and validate a segment pool.
pub fn read_segments<R: BufRead>(reader: R) -> Result<SegmentPool, NetworkError> {
    let mut segments = BTreeMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let id = (line_no + 1) as SegmentId;
        segments.insert(id, parse_line(content, line_no + 1)?);
    }

    SegmentPool::new(segments)
}

fn parse_line(content: &str, line: usize) -> Result<Segment, NetworkError> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    let (coords, flag) = match fields.len() {
        4 => (&fields[..], None),
        5 => (&fields[..4], Some(fields[4])),
        n => {
            return Err(NetworkError::Parse {
                line,
                message: format!("expected 4 coordinates and an optional flag, found {} fields", n),
            })
        }
    };

    let mut values = [0.0f64; 4];
    for (slot, field) in values.iter_mut().zip(coords) {
        *slot = field.parse().map_err(|_| NetworkError::Parse {
            line,
            message: format!("invalid coordinate '{}'", field),
        })?;
    }

    let start = Point::new(values[0], values[1]);
    let end = Point::new(values[2], values[3]);
    match flag {
        None => Ok(Segment::new(start, end)),
        Some("origin") => Ok(Segment::origin(start, end)),
        Some(other) => Err(NetworkError::Parse {
            line,
            message: format!("unknown flag '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_scenario_file() {
        let text = "# outlet\n0 0 0 -1 origin\n1 1 0 0\n\n-1 1 0 0  # west fork\n";
        let pool = read_segments(Cursor::new(text)).expect("valid file");
        assert_eq!(pool.len(), 3);
        let ids: Vec<SegmentId> = pool.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 5]);
        assert!(pool.iter().any(|(_, s)| s.is_origin && s.end == Point::new(0.0, -1.0)));
    }

    #[test]
    fn test_read_reports_line_numbers() {
        let err = read_segments(Cursor::new("0 0 0 -1 origin\n1 x 0 0\n")).unwrap_err();
        assert!(matches!(err, NetworkError::Parse { line: 2, .. }));

        let err = read_segments(Cursor::new("0 0 0 -1 mouth\n")).unwrap_err();
        assert!(matches!(err, NetworkError::Parse { line: 1, .. }));
    }
}
