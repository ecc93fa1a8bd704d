//! Text encoding detection and decoding for annotation files.
//!
//! The WIDER FACE ground-truth files were published with a mix of legacy
//! encodings, so the reader never trusts a single guess: detection always
//! yields *some* encoding, and decoding is a two-attempt strategy (the
//! detected or requested encoding, then a fixed fallback).

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{DecoderResult, Encoding, GBK, WINDOWS_1252};
use tracing::{debug, warn};

use crate::error::FacelabelError;

/// How many leading bytes of a file the detector looks at.
pub const DETECTION_SAMPLE_BYTES: usize = 10_000;

/// Historical default of the corpus; used whenever detection is not
/// informative.
pub const DEFAULT_FALLBACK_ENCODING: &str = "gbk";

/// Lower-case canonical name of an encoding (`utf-8`, `gbk`, ...).
pub fn encoding_label(encoding: &'static Encoding) -> String {
    encoding.name().to_ascii_lowercase()
}

/// Resolves a user-facing label such as `gb2312` or `UTF8`.
///
/// Labels that map to the WHATWG "replacement" encoding are refused, since
/// decoding with it throws the whole input away.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, FacelabelError> {
    Encoding::for_label_no_replacement(label.trim().as_bytes()).ok_or_else(|| {
        FacelabelError::UnknownEncoding {
            label: label.to_string(),
        }
    })
}

/// Folds encodings the corpus is known to mix onto the fallback.
///
/// `gb2312` already resolves to GBK in `encoding_rs`; short GBK samples are
/// also frequently guessed as `windows-1252`.
pub fn canonicalize(
    encoding: &'static Encoding,
    fallback: &'static Encoding,
) -> &'static Encoding {
    if encoding == WINDOWS_1252 || encoding == GBK {
        fallback
    } else {
        encoding
    }
}

/// Guesses the encoding of a byte sample.
///
/// `complete` tells the detector whether the sample is the whole file; a
/// truncated sample may end inside a multi-byte sequence.
pub fn detect_encoding(
    sample: &[u8],
    complete: bool,
    fallback: &'static Encoding,
) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }

    let mut detector = EncodingDetector::new();
    let saw_non_ascii = detector.feed(sample, complete);
    if !saw_non_ascii {
        return fallback;
    }

    canonicalize(detector.guess(None, true), fallback)
}

/// Detects the encoding of a file from its first
/// [`DETECTION_SAMPLE_BYTES`] bytes.
///
/// Never fails: an unreadable file degrades to `fallback` so that the
/// decode step gets to report the real problem.
pub fn detect_file_encoding(path: &Path, fallback: &'static Encoding) -> &'static Encoding {
    match read_sample(path) {
        Ok((sample, complete)) => {
            let encoding = detect_encoding(&sample, complete, fallback);
            debug!(
                path = %path.display(),
                encoding = %encoding_label(encoding),
                sample_bytes = sample.len(),
                "detected annotation encoding"
            );
            encoding
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                fallback = %encoding_label(fallback),
                "encoding detection failed, using fallback"
            );
            fallback
        }
    }
}

fn read_sample(path: &Path) -> std::io::Result<(Vec<u8>, bool)> {
    let file = fs::File::open(path)?;
    let mut sample = Vec::with_capacity(DETECTION_SAMPLE_BYTES + 1);
    // One byte past the cap tells us whether the file continues.
    file.take(DETECTION_SAMPLE_BYTES as u64 + 1)
        .read_to_end(&mut sample)?;
    let complete = sample.len() <= DETECTION_SAMPLE_BYTES;
    sample.truncate(DETECTION_SAMPLE_BYTES);
    Ok((sample, complete))
}

/// Decodes `bytes`, silently dropping malformed sequences.
///
/// Returns the text and the number of bytes that were dropped. A leading
/// BOM selects its own encoding and is stripped.
pub fn decode_dropping_malformed(encoding: &'static Encoding, bytes: &[u8]) -> (String, usize) {
    let mut decoder = encoding.new_decoder();
    let mut text = String::with_capacity(bytes.len());
    let mut input = bytes;
    let mut dropped = 0usize;

    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(input.len())
            .unwrap_or(input.len().saturating_mul(3));
        text.reserve(needed);

        let (result, read) = decoder.decode_to_string_without_replacement(input, &mut text, true);
        input = &input[read..];

        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull => continue,
            DecoderResult::Malformed(bad, _) => dropped += bad as usize,
        }
    }

    (text, dropped)
}

/// Text decoded by a [`DecodeStrategy`].
#[derive(Clone, Debug)]
pub struct DecodedText {
    pub text: String,
    /// Label of the encoding that produced `text`.
    pub encoding: String,
    pub used_fallback: bool,
    pub dropped_bytes: usize,
}

/// Primary-then-fallback decoding of one annotation file.
#[derive(Clone, Debug)]
pub struct DecodeStrategy {
    /// Detected or user-supplied label. May not name a real encoding.
    pub primary: String,
    pub fallback: &'static Encoding,
}

impl DecodeStrategy {
    pub fn new(primary: impl Into<String>, fallback: &'static Encoding) -> Self {
        Self {
            primary: primary.into(),
            fallback,
        }
    }

    /// Decodes `path` with the primary encoding, retrying once with the
    /// fallback on a hard failure.
    pub fn decode_file(&self, path: &Path) -> Result<DecodedText, FacelabelError> {
        let primary_err = match self.attempt_primary(path) {
            Ok(decoded) => return Ok(decoded),
            Err(err) => err,
        };

        let fallback_label = encoding_label(self.fallback);
        warn!(
            path = %path.display(),
            primary = %self.primary,
            fallback = %fallback_label,
            error = %primary_err,
            "decoding failed, retrying with fallback encoding"
        );

        self.attempt_fallback(path)
            .map_err(|fallback_err| FacelabelError::AnnotationDecode {
                path: path.to_path_buf(),
                primary: self.primary.clone(),
                fallback: fallback_label,
                message: primary_err.to_string(),
                source: Box::new(fallback_err),
            })
    }

    /// First attempt: the primary label.
    pub fn attempt_primary(&self, path: &Path) -> Result<DecodedText, FacelabelError> {
        let encoding = resolve_encoding(&self.primary)?;
        decode_with(encoding, path, false)
    }

    /// Second attempt: the fallback encoding.
    pub fn attempt_fallback(&self, path: &Path) -> Result<DecodedText, FacelabelError> {
        decode_with(self.fallback, path, true)
    }
}

fn decode_with(
    encoding: &'static Encoding,
    path: &Path,
    used_fallback: bool,
) -> Result<DecodedText, FacelabelError> {
    let bytes = fs::read(path).map_err(|source| FacelabelError::AnnotationRead {
        path: PathBuf::from(path),
        source,
    })?;
    let (text, dropped_bytes) = decode_dropping_malformed(encoding, &bytes);

    if dropped_bytes > 0 {
        debug!(
            path = %path.display(),
            encoding = %encoding_label(encoding),
            dropped_bytes,
            "dropped undecodable bytes"
        );
    }

    Ok(DecodedText {
        text,
        encoding: encoding_label(encoding),
        used_fallback,
        dropped_bytes,
    })
}
