//! WIDER FACE ground-truth reader.
//!
//! The format has no record delimiter: a path line, a count line, then
//! exactly `count` box rows, repeated until end of file.
//!
//! ```text
//! 0--Parade/0_Parade_marchingband_1_849.jpg
//! 1
//! 449 330 122 149 0 0 0 0 0 0
//! ```
//!
//! Box rows are `x1 y1 w h blur expression illumination invalid occlusion pose`.
//! Because only the count says where a record ends, the parser is an
//! explicit state machine and every consumed line is accounted for, even
//! when it cannot be parsed.

use std::iter::Peekable;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use tracing::info;

use super::bbox::BBoxXYWH;
use super::encoding::{detect_file_encoding, encoding_label, DecodeStrategy};
use super::model::{FaceAttributes, ImageRecord, RawBox};
use crate::error::FacelabelError;

/// Upper bound on box storage reserved up front from a count line.
const MAX_PREALLOCATED_BOXES: usize = 1024;

/// Number of columns in a complete box row.
const BOX_ROW_FIELDS: usize = 10;

/// How an annotation file should be decoded.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Skip detection and try this label first.
    pub encoding: Option<String>,
    pub fallback: &'static Encoding,
}

/// The decoded, non-blank lines of an annotation file.
#[derive(Clone, Debug)]
pub struct AnnotationLines {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub encoding: String,
    pub used_fallback: bool,
    pub dropped_bytes: usize,
}

/// Reads an annotation file into trimmed, non-empty lines.
///
/// The primary encoding is either the forced label or the detected one;
/// see [`DecodeStrategy`] for the retry behavior.
pub fn read_annotation_lines(
    path: &Path,
    opts: &ReadOptions,
) -> Result<AnnotationLines, FacelabelError> {
    let primary = match &opts.encoding {
        Some(label) => label.clone(),
        None => encoding_label(detect_file_encoding(path, opts.fallback)),
    };

    let decoded = DecodeStrategy::new(primary, opts.fallback).decode_file(path)?;
    let lines = non_blank_lines(&decoded.text);

    info!(
        path = %path.display(),
        encoding = %decoded.encoding,
        lines = lines.len(),
        "read annotation file"
    );

    Ok(AnnotationLines {
        path: path.to_path_buf(),
        lines,
        encoding: decoded.encoding,
        used_fallback: decoded.used_fallback,
        dropped_bytes: decoded.dropped_bytes,
    })
}

/// Splits text on any of `\n`, `\r\n`, `\r`, trims each line and drops
/// the blank ones.
pub fn non_blank_lines(text: &str) -> Vec<String> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parser behavior switches.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParserOptions {
    /// The published WIDER FACE files follow a `0` count with one
    /// all-zero row. When set, that row is consumed as part of the record
    /// instead of being read as the next path.
    pub zero_count_placeholder: bool,
}

/// What the parser yields for each stretch of input.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseEvent {
    /// A complete record, or the partial record cut short by end of file
    /// (always followed by [`ParseEvent::Truncated`]).
    Record(ImageRecord),
    /// The count line was not a non-negative integer. The path and count
    /// lines were consumed; parsing resumes with the next line as a path.
    MalformedCount {
        image_relative_path: String,
        line: usize,
        raw: String,
    },
    /// The input ended inside a record. `declared` is `None` when the
    /// count line itself was missing.
    Truncated {
        image_relative_path: String,
        line: usize,
        declared: Option<usize>,
        found: usize,
    },
}

#[derive(Debug)]
enum State {
    ExpectPath,
    ExpectCount { path: String, path_line: usize },
    ExpectBoxRow { record: ImageRecord, remaining: usize },
    Done,
}

/// Lazy record parser over a sequence of annotation lines.
///
/// The iterator is finite and cannot be restarted; parse again from the
/// lines to start over.
pub struct RecordParser<I: Iterator> {
    lines: Peekable<I>,
    line_no: usize,
    state: State,
    pending: Option<ParseEvent>,
    options: ParserOptions,
}

impl<I, S> RecordParser<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    pub fn new(lines: I, options: ParserOptions) -> Self {
        Self {
            lines: lines.peekable(),
            line_no: 0,
            state: State::ExpectPath,
            pending: None,
            options,
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_consumed(&self) -> usize {
        self.line_no
    }

    fn next_line(&mut self) -> Option<String> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line.as_ref().to_string())
    }

    fn skip_zero_placeholder(&mut self) {
        let is_placeholder = self
            .lines
            .peek()
            .is_some_and(|line| is_zero_placeholder_row(line.as_ref()));
        if is_placeholder {
            self.lines.next();
            self.line_no += 1;
        }
    }
}

impl<I, S> Iterator for RecordParser<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = ParseEvent;

    fn next(&mut self) -> Option<ParseEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }

        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,

                State::ExpectPath => {
                    let path = self.next_line()?;
                    self.state = State::ExpectCount {
                        path,
                        path_line: self.line_no,
                    };
                }

                State::ExpectCount { path, path_line } => {
                    let Some(raw) = self.next_line() else {
                        return Some(ParseEvent::Truncated {
                            image_relative_path: path,
                            line: path_line,
                            declared: None,
                            found: 0,
                        });
                    };

                    let Ok(count) = raw.parse::<usize>() else {
                        self.state = State::ExpectPath;
                        return Some(ParseEvent::MalformedCount {
                            image_relative_path: path,
                            line: self.line_no,
                            raw,
                        });
                    };

                    if count == 0 && self.options.zero_count_placeholder {
                        self.skip_zero_placeholder();
                    }

                    self.state = State::ExpectBoxRow {
                        record: ImageRecord {
                            image_relative_path: path,
                            declared_face_count: count,
                            boxes: Vec::with_capacity(count.min(MAX_PREALLOCATED_BOXES)),
                            line: path_line,
                            malformed_rows: 0,
                        },
                        remaining: count,
                    };
                }

                State::ExpectBoxRow {
                    mut record,
                    remaining,
                } => {
                    if remaining == 0 {
                        self.state = State::ExpectPath;
                        return Some(ParseEvent::Record(record));
                    }

                    let Some(row) = self.next_line() else {
                        self.pending = Some(ParseEvent::Truncated {
                            image_relative_path: record.image_relative_path.clone(),
                            line: record.line,
                            declared: Some(record.declared_face_count),
                            found: record.declared_face_count - remaining,
                        });
                        return Some(ParseEvent::Record(record));
                    };

                    // A bad row still uses up one slot of the declared count.
                    match parse_box_row(&row) {
                        Some(raw_box) => record.boxes.push(raw_box),
                        None => record.malformed_rows += 1,
                    }

                    self.state = State::ExpectBoxRow {
                        record,
                        remaining: remaining - 1,
                    };
                }
            }
        }
    }
}

/// Parses one box row.
///
/// Returns `None` unless the four geometry columns are present and parse
/// as floats. Attribute columns are optional; a missing or non-numeric
/// attribute is recorded as unknown.
pub fn parse_box_row(line: &str) -> Option<RawBox> {
    let mut tokens = line.split_whitespace();

    let mut geometry = [0f64; 4];
    for slot in &mut geometry {
        *slot = tokens.next()?.parse::<f64>().ok()?;
    }
    let [x1, y1, w, h] = geometry;

    let mut attribute = || tokens.next().and_then(|token| token.parse::<f64>().ok());
    let attributes = FaceAttributes {
        blur: attribute(),
        expression: attribute(),
        illumination: attribute(),
        invalid: attribute(),
        occlusion: attribute(),
        pose: attribute(),
    };

    Some(RawBox::new(BBoxXYWH::new(x1, y1, w, h), attributes))
}

fn is_zero_placeholder_row(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().take(BOX_ROW_FIELDS + 1).collect();
    tokens.len() == BOX_ROW_FIELDS
        && tokens
            .iter()
            .all(|token| token.parse::<f64>().is_ok_and(|value| value == 0.0))
}

/// Fuzz-only entrypoint for record parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_records(input: &str) -> usize {
    let lines = non_blank_lines(input);
    let options = ParserOptions {
        zero_count_placeholder: input.len() % 2 == 0,
    };
    RecordParser::new(lines.iter(), options).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::GBK;
    use std::fs;

    fn parse(lines: &[&str]) -> Vec<ParseEvent> {
        RecordParser::new(lines.iter(), ParserOptions::default()).collect()
    }

    fn record(event: &ParseEvent) -> &ImageRecord {
        match event {
            ParseEvent::Record(record) => record,
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn parses_consecutive_records() {
        let events = parse(&[
            "a.jpg",
            "2",
            "10 10 20 20 0 0 0 0 0 0",
            "5 5 9999 9999 0 0 0 1 0 0",
            "b.jpg",
            "1",
            "1 2 3 4 2 0 1 0 0 0",
        ]);

        assert_eq!(events.len(), 2);
        let a = record(&events[0]);
        assert_eq!(a.image_relative_path, "a.jpg");
        assert_eq!(a.declared_face_count, 2);
        assert_eq!(a.boxes.len(), 2);
        assert_eq!(a.line, 1);
        assert!(a.boxes[1].is_invalid());

        let b = record(&events[1]);
        assert_eq!(b.image_relative_path, "b.jpg");
        assert_eq!(b.line, 5);
        assert_eq!(b.boxes[0].attributes.blur, Some(2.0));
        assert_eq!(b.boxes[0].attributes.illumination, Some(1.0));
    }

    #[test]
    fn malformed_rows_still_consume_declared_count() {
        let events = parse(&[
            "a.jpg",
            "3",
            "not a box",
            "1 2 3 4 0 0 0 0 0 0",
            "1 2",
            "b.jpg",
            "0",
        ]);

        assert_eq!(events.len(), 2);
        let a = record(&events[0]);
        assert_eq!(a.boxes.len(), 1);
        assert_eq!(a.malformed_rows, 2);
        assert_eq!(record(&events[1]).image_relative_path, "b.jpg");
    }

    #[test]
    fn malformed_count_abandons_record_and_resumes() {
        let events = parse(&["a.jpg", "two", "b.jpg", "1", "1 1 1 1 0 0 0 0 0 0"]);

        assert_eq!(
            events[0],
            ParseEvent::MalformedCount {
                image_relative_path: "a.jpg".to_string(),
                line: 2,
                raw: "two".to_string(),
            }
        );
        assert_eq!(record(&events[1]).image_relative_path, "b.jpg");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn negative_count_is_malformed() {
        let events = parse(&["a.jpg", "-1"]);
        assert!(matches!(events[0], ParseEvent::MalformedCount { .. }));
    }

    #[test]
    fn missing_count_line_is_truncation() {
        let events = parse(&["a.jpg", "0", "b.jpg"]);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ParseEvent::Truncated {
                image_relative_path: "b.jpg".to_string(),
                line: 3,
                declared: None,
                found: 0,
            }
        );
    }

    #[test]
    fn short_box_list_emits_partial_record_then_truncation() {
        let events = parse(&["a.jpg", "3", "1 1 4 4 0 0 0 0 0 0"]);

        assert_eq!(events.len(), 2);
        let a = record(&events[0]);
        assert_eq!(a.declared_face_count, 3);
        assert_eq!(a.boxes.len(), 1);
        assert_eq!(
            events[1],
            ParseEvent::Truncated {
                image_relative_path: "a.jpg".to_string(),
                line: 1,
                declared: Some(3),
                found: 1,
            }
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse(&[]).is_empty());
    }

    #[test]
    fn zero_count_placeholder_is_consumed_only_when_enabled() {
        let lines = ["a.jpg", "0", "0 0 0 0 0 0 0 0 0 0", "b.jpg", "0"];

        let strict = parse(&lines);
        // Strict counting reads the placeholder as a path.
        assert_eq!(record(&strict[0]).image_relative_path, "a.jpg");
        assert!(matches!(strict[1], ParseEvent::MalformedCount { .. }));

        let options = ParserOptions {
            zero_count_placeholder: true,
        };
        let lenient: Vec<ParseEvent> = RecordParser::new(lines.iter(), options).collect();
        assert_eq!(lenient.len(), 2);
        assert_eq!(record(&lenient[0]).boxes.len(), 0);
        assert_eq!(record(&lenient[1]).image_relative_path, "b.jpg");
    }

    #[test]
    fn zero_count_placeholder_leaves_real_paths_alone() {
        let options = ParserOptions {
            zero_count_placeholder: true,
        };
        let lines = ["a.jpg", "0", "b.jpg", "0"];
        let events: Vec<ParseEvent> = RecordParser::new(lines.iter(), options).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(record(&events[1]).image_relative_path, "b.jpg");
    }

    #[test]
    fn lines_consumed_tracks_position() {
        let lines = ["a.jpg", "1", "1 1 1 1 0 0 0 0 0 0", "b.jpg", "0"];
        let mut parser = RecordParser::new(lines.iter(), ParserOptions::default());
        parser.next();
        assert_eq!(parser.lines_consumed(), 3);
        parser.next();
        assert_eq!(parser.lines_consumed(), 5);
    }

    #[test]
    fn parse_box_row_tolerates_missing_attributes() {
        let row = parse_box_row("1.5 2 3 4").expect("geometry is enough");
        assert_eq!(row.bbox.x, 1.5);
        assert_eq!(row.attributes, FaceAttributes::default());
        assert!(!row.is_invalid());
    }

    #[test]
    fn invalid_flag_written_as_float_is_honoured() {
        assert!(parse_box_row("1 2 3 4 0 0 0 1.0 0 0").expect("row").is_invalid());
        assert!(!parse_box_row("1 2 3 4 0 0 0 0.0 0 0").expect("row").is_invalid());
        assert!(!parse_box_row("1 2 3 4 0 0 0 - 0 0").expect("row").is_invalid());
    }

    #[test]
    fn parse_box_row_rejects_bad_geometry() {
        assert!(parse_box_row("1 2 three 4 0 0 0 0 0 0").is_none());
        assert!(parse_box_row("1 2 3").is_none());
    }

    #[test]
    fn non_blank_lines_handles_mixed_line_endings() {
        let lines = non_blank_lines("a.jpg\r\n 1 \r\n\r\n1 2 3 4\rb.jpg\n\n");
        assert_eq!(lines, vec!["a.jpg", "1", "1 2 3 4", "b.jpg"]);
    }

    #[test]
    fn read_annotation_lines_detects_gbk() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("gt.txt");
        let text = "人脸检测/图片一号.jpg\n1\n1 2 3 4 0 0 0 0 0 0\n".repeat(20);
        let (bytes, _, _) = GBK.encode(&text);
        fs::write(&path, &bytes).expect("write file");

        let opts = ReadOptions {
            encoding: None,
            fallback: GBK,
        };
        let read = read_annotation_lines(&path, &opts).expect("read lines");
        assert_eq!(read.encoding, "gbk");
        assert_eq!(read.lines.len(), 60);
        assert_eq!(read.lines[0], "人脸检测/图片一号.jpg");
    }

    #[test]
    fn read_annotation_lines_honors_forced_encoding() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("gt.txt");
        fs::write(&path, "a.jpg\n\n  0  \n").expect("write file");

        let opts = ReadOptions {
            encoding: Some("utf-8".to_string()),
            fallback: GBK,
        };
        let read = read_annotation_lines(&path, &opts).expect("read lines");
        assert_eq!(read.encoding, "utf-8");
        assert!(!read.used_fallback);
        assert_eq!(read.lines, vec!["a.jpg", "0"]);
    }
}
