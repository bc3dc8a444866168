//! Encoding and delimiter detection over a bounded prefix of the input.
//!
//! Both detectors are advisory. When the evidence is inconclusive they fall
//! back to UTF-8 and `,` respectively and log a warning instead of failing.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

use crate::error::{IngestError, Result};

/// Bytes inspected for encoding detection.
pub const ENCODING_SAMPLE_SIZE: usize = 12 * 1024;

/// Characters inspected for delimiter detection.
pub const DELIMITER_SAMPLE_SIZE: usize = 16 * 1024;

/// Delimiters tried by [`detect_delimiter`], in tie-break order.
pub const CANDIDATE_DELIMITERS: &[u8] = b",;\t|";

/// Records sampled per delimiter candidate.
const MAX_SAMPLE_RECORDS: usize = 50;

/// Guesses the text encoding of `bytes` from its first
/// [`ENCODING_SAMPLE_SIZE`] bytes.
///
/// A byte order mark wins outright. Valid UTF-8 is taken as UTF-8. Anything
/// else goes to the statistical detector, whose guess must decode the sample
/// cleanly to be accepted.
///
/// # Examples
///
/// ```
/// use sdif_ingest::detect_encoding;
///
/// assert_eq!(detect_encoding("naïve,café\n".as_bytes()).name(), "UTF-8");
/// assert_eq!(detect_encoding(b"\xFF\xFEa\x00").name(), "UTF-16LE");
/// ```
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let sample = &bytes[..bytes.len().min(ENCODING_SAMPLE_SIZE)];

    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        debug!(encoding = encoding.name(), "Encoding taken from byte order mark");
        return encoding;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => return UTF_8,
        // Sample cut in the middle of a multi-byte sequence.
        Err(e) if e.error_len().is_none() => return UTF_8,
        Err(_) => {}
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample.len() == bytes.len());
    let guess = detector.guess(None, true);
    if guess
        .decode_without_bom_handling_and_without_replacement(sample)
        .is_some()
    {
        debug!(encoding = guess.name(), "Detected encoding");
        return guess;
    }

    warn!(
        guess = guess.name(),
        "Encoding detection inconclusive, falling back to UTF-8"
    );
    UTF_8
}

/// Looks up an explicit encoding label such as `latin1` or `utf-16le`.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IngestError::UnknownEncoding(label.to_string()))
}

/// Decodes `bytes` as `encoding`, honoring a byte order mark if present.
/// Malformed sequences are replaced and reported with a warning.
pub fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            encoding = used.name(),
            "Input contained malformed sequences, replaced with U+FFFD"
        );
    }
    text
}

/// Guesses the field delimiter from the start of `text`.
///
/// Each candidate in [`CANDIDATE_DELIMITERS`] splits the sample into
/// records. The candidate whose most common field count is above one and
/// covers the largest share of records wins; ties go to the wider split,
/// then to the earlier candidate.
///
/// # Examples
///
/// ```
/// use sdif_ingest::detect_delimiter;
///
/// assert_eq!(detect_delimiter("a;b;c\n1;2;3\n4;5;6\n"), b';');
/// assert_eq!(detect_delimiter("a\tb\n1\t2\n"), b'\t');
/// assert_eq!(detect_delimiter("just one column\n"), b',');
/// ```
pub fn detect_delimiter(text: &str) -> u8 {
    let sample = bounded_sample(text);

    let mut best: Option<(u8, f64, usize)> = None;
    for &delimiter in CANDIDATE_DELIMITERS {
        let Some((consistency, width)) = score_delimiter(sample, delimiter) else {
            continue;
        };
        let better = best.is_none_or(|(_, best_consistency, best_width)| {
            consistency > best_consistency
                || (consistency == best_consistency && width > best_width)
        });
        if better {
            best = Some((delimiter, consistency, width));
        }
    }

    match best {
        Some((delimiter, consistency, width)) => {
            debug!(
                delimiter = %char::from(delimiter).escape_default(),
                consistency,
                width,
                "Detected delimiter"
            );
            delimiter
        }
        None => {
            warn!("Delimiter detection inconclusive, falling back to ','");
            b','
        }
    }
}

/// Cuts the sample at the last line break inside the size bound so a
/// partial trailing record does not skew the counts.
fn bounded_sample(text: &str) -> &str {
    if text.len() <= DELIMITER_SAMPLE_SIZE {
        return text;
    }
    let mut end = DELIMITER_SAMPLE_SIZE;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let head = &text[..end];
    match head.rfind('\n') {
        Some(newline) => &head[..=newline],
        None => head,
    }
}

/// Returns the share of records with the modal field count, and that count,
/// or `None` when the candidate never splits a record.
fn score_delimiter(sample: &str, delimiter: u8) -> Option<(f64, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes());

    let mut counts: Vec<usize> = Vec::new();
    for record in reader.records().take(MAX_SAMPLE_RECORDS) {
        let Ok(record) = record else {
            return None;
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        counts.push(record.len());
    }
    if counts.is_empty() {
        return None;
    }

    let mut tally: Vec<(usize, usize)> = Vec::new();
    for &count in &counts {
        match tally.iter_mut().find(|(width, _)| *width == count) {
            Some((_, seen)) => *seen += 1,
            None => tally.push((count, 1)),
        }
    }
    let (width, seen) = tally
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))?;
    if width < 2 {
        return None;
    }
    Some((seen as f64 / counts.len() as f64, width))
}
