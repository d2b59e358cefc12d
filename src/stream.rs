//! Streams of JSON values.
//!
//! A [`StreamDecoder`] reads whitespace-separated values from any [`Read`]
//! source. Input is pulled in [`STREAM_CHUNK_SIZE`] chunks into a
//! [`StreamBuffer`]; consumed bytes are dropped before each refill, so the
//! buffer never holds much more than the largest single value plus one chunk.
//!
//! A [`StreamEncoder`] writes one value per call to any [`Write`] sink, each
//! followed by a newline.
//!
//! ```rust
//! use opjson::StreamDecoder;
//!
//! let mut stream = StreamDecoder::new(&b"1 2\n[3]"[..]);
//! assert_eq!(stream.decode::<u32>().unwrap(), 1);
//! assert_eq!(stream.decode::<u32>().unwrap(), 2);
//! assert_eq!(stream.decode::<Vec<u32>>().unwrap(), [3]);
//! assert!(!stream.more().unwrap());
//! ```

use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::cache::ProgramCache;
use crate::config::{Config, IndentConfig};
use crate::constants::STREAM_CHUNK_SIZE;
use crate::describe::Describe;
use crate::error::{JsonError, Result};
use crate::runtime::ContextGuard;
use crate::scanner::Scanner;
use crate::vm;

/// Outcome of looking for the next complete value in a [`StreamBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// A whole value starts at the cursor.
    Ready,
    /// The value at the cursor may continue past the buffered bytes.
    NeedMore,
    /// Only whitespace is left and no more input will come.
    End,
}

/// Incrementally filled input with a cursor that survives refills.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buf: Vec<u8>,
    cursor: usize,
    /// Bytes dropped from the front so far.
    consumed: usize,
    eof: bool,
}

impl StreamBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends input.
    pub fn feed(&mut self, data: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(data);
    }

    /// Marks the input as complete.
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// `true` once [`finish`](Self::finish) was called or the reader hit end of file.
    pub fn is_finished(&self) -> bool {
        self.eof
    }

    /// Input buffered but not decoded yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    /// Offset of the cursor from the start of the stream.
    pub fn offset(&self) -> usize {
        self.consumed + self.cursor
    }

    /// Drops decoded input from the front.
    fn compact(&mut self) {
        if self.cursor > 0 {
            self.buf.drain(..self.cursor);
            self.consumed += self.cursor;
            self.cursor = 0;
        }
    }

    /// Reads up to one chunk from `reader`. Returns `false` at end of file.
    fn fill_from<R: Read>(&mut self, reader: &mut R) -> io::Result<bool> {
        self.compact();
        let start = self.buf.len();
        self.buf.resize(start + STREAM_CHUNK_SIZE, 0);
        let read = loop {
            match reader.read(&mut self.buf[start..]) {
                Ok(n) => break Ok(n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => break Err(err),
            }
        };
        match read {
            Ok(n) => {
                self.buf.truncate(start + n);
                trace!(read = n, buffered = self.buf.len() - self.cursor, "filled stream buffer");
                if n == 0 {
                    self.eof = true;
                }
                Ok(n > 0)
            }
            Err(err) => {
                self.buf.truncate(start);
                Err(err)
            }
        }
    }

    fn scan(&self) -> Result<Scan> {
        let mut sc = Scanner::at(&self.buf, self.cursor);
        sc.skip_ws();
        let Some(first) = sc.peek() else {
            return Ok(if self.eof { Scan::End } else { Scan::NeedMore });
        };
        match sc.skip_value(0) {
            // A number ending at the buffer edge may have more digits coming.
            Ok((_, end)) if !self.eof && end == self.buf.len() && matches!(first, b'-' | b'0'..=b'9') => {
                Ok(Scan::NeedMore)
            }
            Ok(_) => Ok(Scan::Ready),
            Err(JsonError::Syntax { offset, .. }) if !self.eof && offset >= self.buf.len() => Ok(Scan::NeedMore),
            Err(err) => Err(err.shift_offset(self.consumed)),
        }
    }

    /// Decodes the complete value at the cursor into `target` and moves past it.
    fn decode_into<T: Describe>(&mut self, cache: &ProgramCache, config: &Config, target: &mut T) -> Result<()> {
        let compiled = cache.compile::<T>();
        let mut ctx = ContextGuard::new(config);
        match vm::decode(compiled.decode(), &mut ctx, &self.buf, self.cursor, Some(target)) {
            Ok(pos) => {
                self.cursor = pos;
                Ok(())
            }
            Err(err) => {
                // The value was complete, so skip it and let the caller carry on.
                let mut sc = Scanner::at(&self.buf, self.cursor);
                if let Ok((_, end)) = sc.skip_value(0) {
                    self.cursor = end;
                }
                Err(err.shift_offset(self.consumed))
            }
        }
    }
}

/// Reads a sequence of JSON values from a reader.
pub struct StreamDecoder<R> {
    reader: R,
    buffer: StreamBuffer,
    cache: Arc<ProgramCache>,
    config: Config,
}

impl<R> std::fmt::Debug for StreamDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("buffer", &self.buffer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: Read> StreamDecoder<R> {
    /// A decoder using the process-wide cache and the default configuration.
    pub fn new(reader: R) -> Self {
        Self::with_parts(reader, Arc::clone(ProgramCache::global()), Config::default())
    }

    pub(crate) fn with_parts(reader: R, cache: Arc<ProgramCache>, config: Config) -> Self {
        Self {
            reader,
            buffer: StreamBuffer::new(),
            cache,
            config,
        }
    }

    /// Keep numbers held by [`crate::Value`] verbatim.
    pub fn use_number(&mut self, enable: bool) {
        self.config.use_number = enable;
    }

    /// Fail on object keys that match no field.
    pub fn disallow_unknown_fields(&mut self, enable: bool) {
        self.config.disallow_unknown_fields = enable;
    }

    /// Decodes the next value.
    ///
    /// Fails with [`JsonError::EndOfStream`] when the source is exhausted.
    pub fn decode<T: Describe>(&mut self) -> Result<T> {
        let mut value = T::default();
        self.decode_into(&mut value)?;
        Ok(value)
    }

    /// Decodes the next value into an existing one.
    pub fn decode_into<T: Describe>(&mut self, target: &mut T) -> Result<()> {
        if !self.ready()? {
            return Err(JsonError::EndOfStream);
        }
        self.buffer.decode_into(&self.cache, &self.config, target)
    }

    /// Reports whether another value follows.
    pub fn more(&mut self) -> Result<bool> {
        self.ready()
    }

    /// Buffers input until a whole value is available. `false` at a clean end.
    fn ready(&mut self) -> Result<bool> {
        loop {
            match self.buffer.scan()? {
                Scan::Ready => return Ok(true),
                Scan::End => return Ok(false),
                Scan::NeedMore => {
                    self.buffer.fill_from(&mut self.reader)?;
                }
            }
        }
    }

    /// Input read from the source but not decoded yet.
    pub fn buffered(&self) -> &[u8] {
        self.buffer.buffered()
    }

    /// Offset of the next value from the start of the stream.
    pub fn offset(&self) -> usize {
        self.buffer.offset()
    }

    /// Iterates over the remaining values as `T`.
    pub fn iter<T: Describe>(&mut self) -> StreamIter<'_, R, T> {
        StreamIter {
            decoder: self,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying reader. Buffered input is lost.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Iterator returned by [`StreamDecoder::iter`].
#[derive(Debug)]
pub struct StreamIter<'d, R, T> {
    decoder: &'d mut StreamDecoder<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<R: Read, T: Describe> Iterator for StreamIter<'_, R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        match self.decoder.decode::<T>() {
            Err(JsonError::EndOfStream) => None,
            other => Some(other),
        }
    }
}

/// Writes JSON values to a writer, one per line.
pub struct StreamEncoder<W> {
    writer: W,
    cache: Arc<ProgramCache>,
    config: Config,
}

impl<W> std::fmt::Debug for StreamEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEncoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<W: Write> StreamEncoder<W> {
    /// An encoder using the process-wide cache and the default configuration.
    pub fn new(writer: W) -> Self {
        Self::with_parts(writer, Arc::clone(ProgramCache::global()), Config::default())
    }

    pub(crate) fn with_parts(writer: W, cache: Arc<ProgramCache>, config: Config) -> Self {
        Self { writer, cache, config }
    }

    /// Escape `<`, `>` and `&` in strings.
    pub fn set_escape_html(&mut self, enable: bool) {
        self.config.escape_html = enable;
    }

    /// Switches to the indent layout. Empty `prefix` and `unit` switch back to compact.
    pub fn set_indent(&mut self, prefix: &str, unit: &str) {
        self.config.indent = if prefix.is_empty() && unit.is_empty() {
            None
        } else {
            Some(IndentConfig::new(prefix, unit))
        };
    }

    /// Writes `value` followed by a newline.
    ///
    /// Nothing is written when encoding fails.
    pub fn encode<T: Describe>(&mut self, value: &T) -> Result<()> {
        let compiled = self.cache.compile::<T>();
        let mut ctx = ContextGuard::new(&self.config);
        vm::encode(compiled.encode(self.config.indent.is_some()), &mut ctx, value)?;
        ctx.buf.push(b'\n');
        self.writer.write_all(ctx.output())?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(out.len()).min(self.data.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn values_split_across_reads_are_reassembled() {
        let input = br#"{"a": [1, 2, 3]} 12345 "text" true"#;
        let mut stream = StreamDecoder::new(Trickle { data: input, step: 3 });
        let first: Value = stream.decode().unwrap();
        assert_eq!(first["a"][2].as_i64(), Some(3));
        assert_eq!(stream.decode::<u64>().unwrap(), 12345);
        assert_eq!(stream.decode::<String>().unwrap(), "text");
        assert!(stream.decode::<bool>().unwrap());
        assert!(matches!(stream.decode::<bool>(), Err(JsonError::EndOfStream)));
    }

    #[test]
    fn trailing_whitespace_is_a_clean_end() {
        let mut stream = StreamDecoder::new(&b" 1 \n\n "[..]);
        assert!(stream.more().unwrap());
        assert_eq!(stream.decode::<u8>().unwrap(), 1);
        assert!(!stream.more().unwrap());
    }

    #[test]
    fn truncated_value_is_a_syntax_error() {
        let mut stream = StreamDecoder::new(&b"[1, 2"[..]);
        assert!(matches!(stream.decode::<Vec<u8>>(), Err(JsonError::Syntax { .. })));
    }

    #[test]
    fn error_offsets_count_from_stream_start() {
        let mut stream = StreamDecoder::new(Trickle {
            data: b"1 2 [x]",
            step: 2,
        });
        stream.decode::<u8>().unwrap();
        stream.decode::<u8>().unwrap();
        let err = stream.decode::<Vec<u8>>().unwrap_err();
        assert_eq!(err.offset(), Some(5));
    }

    #[test]
    fn type_errors_skip_the_bad_value() {
        let mut stream = StreamDecoder::new(&br#""no" 7"#[..]);
        assert!(matches!(stream.decode::<u8>(), Err(JsonError::UnmarshalType { .. })));
        assert_eq!(stream.decode::<u8>().unwrap(), 7);
    }

    #[test]
    fn iter_stops_at_end_of_stream() {
        let mut stream = StreamDecoder::new(&b"[1] [] [2,3]"[..]);
        let all: Vec<Vec<u8>> = stream.iter().collect::<Result<_>>().unwrap();
        assert_eq!(all, [vec![1], vec![], vec![2, 3]]);
    }

    #[test]
    fn buffer_stays_bounded() {
        let mut input = Vec::new();
        for i in 0..10_000 {
            input.extend_from_slice(format!("{i}\n").as_bytes());
        }
        let mut stream = StreamDecoder::new(&input[..]);
        let mut sum = 0u64;
        for value in stream.iter::<u64>() {
            sum += value.unwrap();
        }
        assert_eq!(sum, (0..10_000u64).sum());
        assert!(stream.buffer.buf.capacity() <= 2 * STREAM_CHUNK_SIZE);
    }

    #[test]
    fn encoder_writes_one_value_per_line() {
        let mut out = Vec::new();
        let mut enc = StreamEncoder::new(&mut out);
        enc.encode(&vec![1u8, 2]).unwrap();
        enc.encode(&"<b>".to_string()).unwrap();
        enc.set_escape_html(false);
        enc.encode(&"<b>".to_string()).unwrap();
        enc.set_indent("", " ");
        enc.encode(&vec![3u8]).unwrap();
        let expected = "[1,2]\n\"\\u003cb\\u003e\"\n\"<b>\"\n[\n 3\n]\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn fed_buffer_tracks_offsets() {
        let mut buffer = StreamBuffer::new();
        buffer.feed(b"[1] ");
        assert_eq!(buffer.scan().unwrap(), Scan::Ready);
        let mut v: Vec<u8> = Vec::new();
        buffer
            .decode_into(&ProgramCache::new(), &Config::default(), &mut v)
            .unwrap();
        assert_eq!(buffer.offset(), 3);
        buffer.feed(b"4");
        assert_eq!(buffer.scan().unwrap(), Scan::NeedMore);
        buffer.feed(b"2");
        buffer.finish();
        assert_eq!(buffer.scan().unwrap(), Scan::Ready);
        let mut n = 0u32;
        buffer
            .decode_into(&ProgramCache::new(), &Config::default(), &mut n)
            .unwrap();
        assert_eq!(n, 42);
        assert_eq!(buffer.buffered(), b"");
        assert_eq!(buffer.offset(), 6);
    }
}
