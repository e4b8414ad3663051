//! Text encoding detection and streaming decode to UTF-8

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use std::io::{self, Read};

/// Number of leading bytes inspected when guessing a file's encoding
pub const SAMPLE_SIZE: usize = 10_000;

const BUFFER_SIZE: usize = 8 * 1024;

/// Guess the encoding of a byte sample.
///
/// A byte-order mark wins outright. BOM-less UTF-16 is recognised by its NUL
/// bytes, and a sample that is valid UTF-8 is UTF-8. Everything else goes to
/// the statistical detector; a guess it does not trust falls back to
/// windows-1252, which decodes every byte.
///
/// `complete` is false when the sample was cut from a longer input, in which
/// case a multi-byte sequence truncated at the end is tolerated.
pub fn detect_encoding(sample: &[u8], complete: bool) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        log::debug!("Detected encoding {} from byte-order mark", encoding.name());
        return encoding;
    }

    if let Some(encoding) = detect_utf16(sample) {
        log::debug!("Detected BOM-less {} from NUL byte positions", encoding.name());
        return encoding;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => return UTF_8,
        Err(e) if !complete && e.error_len().is_none() => return UTF_8,
        Err(_) => {}
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, complete);
    let (guess, confident) = detector.guess_assess(None, false);
    if confident {
        log::debug!("Detected encoding {}", guess.name());
        guess
    } else {
        log::debug!(
            "Low confidence guess {}, falling back to {}",
            guess.name(),
            WINDOWS_1252.name()
        );
        WINDOWS_1252
    }
}

/// Text in UTF-16 puts a NUL in one half of almost every code unit when the
/// content is mostly ASCII. Requires NULs in at least a third of the code
/// units, all on the same side.
fn detect_utf16(sample: &[u8]) -> Option<&'static Encoding> {
    let units = sample.len() / 2;
    if units < 2 {
        return None;
    }
    let (mut even, mut odd) = (0usize, 0usize);
    for pair in sample.chunks_exact(2) {
        if pair[0] == 0 {
            even += 1;
        }
        if pair[1] == 0 {
            odd += 1;
        }
    }
    let threshold = units.div_ceil(3);
    match (even, odd) {
        (0, odd) if odd >= threshold => Some(UTF_16LE),
        (even, 0) if even >= threshold => Some(UTF_16BE),
        _ => None,
    }
}

/// A reader that decodes another reader's bytes into UTF-8 on the fly
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    output: Vec<u8>,
    output_pos: usize,
    output_len: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            input: vec![0; BUFFER_SIZE],
            input_pos: 0,
            input_len: 0,
            // Worst case expansion of one input byte is three UTF-8 bytes
            output: vec![0; BUFFER_SIZE * 3 + 16],
            output_pos: 0,
            output_len: 0,
            eof: false,
            finished: false,
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_pos < self.output_len {
                let n = buf.len().min(self.output_len - self.output_pos);
                buf[..n].copy_from_slice(&self.output[self.output_pos..self.output_pos + n]);
                self.output_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            if self.input_pos == self.input_len && !self.eof {
                let n = self.inner.read(&mut self.input)?;
                self.input_pos = 0;
                self.input_len = n;
                self.eof = n == 0;
            }

            let (result, read, written, _) = self.decoder.decode_to_utf8(
                &self.input[self.input_pos..self.input_len],
                &mut self.output,
                self.eof,
            );
            self.input_pos += read;
            self.output_pos = 0;
            self.output_len = written;

            if self.eof && self.input_pos == self.input_len && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}
