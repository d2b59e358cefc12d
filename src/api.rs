use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use rayon::prelude::*;
use tracing::debug;

use crate::cache::ProgramCache;
use crate::config::Config;
use crate::describe::Describe;
use crate::error::Result;
use crate::runtime::ContextGuard;
use crate::scanner::Scanner;
use crate::stream::{StreamDecoder, StreamEncoder};
use crate::vm;

/// The main entry point for encoding and decoding.
///
/// A codec pairs a program cache with a [`Config`]. It is cheap to clone and
/// safe to share between threads; every call borrows a pooled runtime context
/// for its own duration.
#[derive(Debug, Clone)]
pub struct Codec {
    cache: Arc<ProgramCache>,
    config: Config,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Codec {
    /// A codec backed by the process-wide program cache.
    pub fn new(config: Config) -> Self {
        Self::with_cache(Arc::clone(ProgramCache::global()), config)
    }

    /// A codec backed by its own program cache.
    pub fn with_cache(cache: Arc<ProgramCache>, config: Config) -> Self {
        Self { cache, config }
    }

    /// The configuration every call uses.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The program cache.
    pub fn cache(&self) -> &Arc<ProgramCache> {
        &self.cache
    }

    /// Encodes `value`, using the indent layout when the configuration has one.
    pub fn to_vec<T: Describe>(&self, value: &T) -> Result<Vec<u8>> {
        let compiled = self.cache.compile::<T>();
        let mut ctx = ContextGuard::new(&self.config);
        vm::encode(compiled.encode(self.config.indent.is_some()), &mut ctx, value)?;
        Ok(ctx.take_output())
    }

    /// Encodes `value` in the indent layout with the given prefix and unit.
    pub fn to_vec_indent<T: Describe>(&self, value: &T, prefix: &str, unit: &str) -> Result<Vec<u8>> {
        let compiled = self.cache.compile::<T>();
        let mut ctx = ContextGuard::new(&self.config);
        ctx.set_indent(prefix, unit);
        vm::encode(compiled.encode_indent(), &mut ctx, value)?;
        Ok(ctx.take_output())
    }

    /// Encodes every value of `values` in parallel.
    ///
    /// Each worker borrows its own pooled context. The outputs are in input
    /// order. If any value fails, one of the failures is returned.
    pub fn to_vec_batch<T: Describe + Sync>(&self, values: &[T]) -> Result<Vec<Vec<u8>>> {
        // Compile up front so workers only read the cache.
        let compiled = self.cache.compile::<T>();
        let program = compiled.encode(self.config.indent.is_some());
        debug!(type_name = compiled.type_name(), count = values.len(), "encoding batch");
        values
            .par_iter()
            .map(|value| {
                let mut ctx = ContextGuard::new(&self.config);
                vm::encode(program, &mut ctx, value)?;
                Ok(ctx.take_output())
            })
            .collect()
    }

    /// Decodes exactly one JSON value from `input`.
    pub fn from_slice<T: Describe>(&self, input: &[u8]) -> Result<T> {
        let mut value = T::default();
        self.from_slice_into(input, &mut value)?;
        Ok(value)
    }

    /// Decodes exactly one JSON value from `input` into an existing value.
    ///
    /// Fields the input does not mention keep their current contents. On error
    /// the target may be partially updated.
    pub fn from_slice_into<T: Describe>(&self, input: &[u8], target: &mut T) -> Result<()> {
        let compiled = self.cache.compile::<T>();
        let mut ctx = ContextGuard::new(&self.config);
        let pos = vm::decode(compiled.decode(), &mut ctx, input, 0, Some(target))?;
        Scanner::at(input, pos).finish()
    }

    /// Decodes a file by mapping it into memory.
    pub fn from_file<T, P>(&self, path: P) -> Result<T>
    where
        T: Describe,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path)?;

        // 1. Mapping an empty file fails on some platforms; it is simply empty input.
        if file.metadata()?.len() == 0 {
            return self.from_slice(b"");
        }

        // 2. Map the file.
        // Safety: Mmap is fundamentally unsafe as external processes could modify the file.
        // We assume the file is not modified while the decode runs.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(path = %path.display(), len = mmap.len(), "decoding mapped file");

        // 3. Decode straight from the mapping.
        self.from_slice(&mmap)
    }

    /// A stream decoder sharing this codec's cache and configuration.
    pub fn stream_decoder<R: Read>(&self, reader: R) -> StreamDecoder<R> {
        StreamDecoder::with_parts(reader, Arc::clone(&self.cache), self.config.clone())
    }

    /// A stream encoder sharing this codec's cache and configuration.
    pub fn stream_encoder<W: Write>(&self, writer: W) -> StreamEncoder<W> {
        StreamEncoder::with_parts(writer, Arc::clone(&self.cache), self.config.clone())
    }
}

/// Encodes `value` with the default configuration.
///
/// ```rust
/// assert_eq!(opjson::to_vec(&vec![1u8, 2]).unwrap(), b"[1,2]");
/// ```
pub fn to_vec<T: Describe>(value: &T) -> Result<Vec<u8>> {
    Codec::default().to_vec(value)
}

/// Encodes `value` in the indent layout with the default configuration.
pub fn to_vec_indent<T: Describe>(value: &T, prefix: &str, unit: &str) -> Result<Vec<u8>> {
    Codec::default().to_vec_indent(value, prefix, unit)
}

/// Decodes exactly one JSON value with the default configuration.
///
/// ```rust
/// let v: Vec<u8> = opjson::from_slice(b" [1, 2] ").unwrap();
/// assert_eq!(v, [1, 2]);
/// ```
pub fn from_slice<T: Describe>(input: &[u8]) -> Result<T> {
    Codec::default().from_slice(input)
}

/// Decodes exactly one JSON value into `target` with the default configuration.
pub fn from_slice_into<T: Describe>(input: &[u8], target: &mut T) -> Result<()> {
    Codec::default().from_slice_into(input, target)
}

/// Decodes a file with the default configuration.
pub fn from_file<T: Describe, P: AsRef<Path>>(path: P) -> Result<T> {
    Codec::default().from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JsonError;

    #[test]
    fn trailing_data_is_rejected() {
        let err = from_slice::<u32>(b"1 2").unwrap_err();
        assert!(matches!(err, JsonError::Syntax { offset: 2, .. }));
    }

    #[test]
    fn configured_indent_applies_to_to_vec() {
        let codec = Codec::new(Config::builder().indent("", "  ").build());
        assert_eq!(codec.to_vec(&vec![1u8]).unwrap(), b"[\n  1\n]");
        assert_eq!(codec.to_vec_indent(&vec![1u8], ">", "\t").unwrap(), b"[\n>\t1\n>]");
    }

    #[test]
    fn batch_preserves_order() {
        let values: Vec<Vec<u32>> = (0..64).map(|i| vec![i, i + 1]).collect();
        let out = Codec::default().to_vec_batch(&values).unwrap();
        for (i, bytes) in out.iter().enumerate() {
            assert_eq!(bytes, format!("[{},{}]", i, i + 1).as_bytes());
        }
    }

    #[test]
    fn batch_reports_failures() {
        let values = vec![1.0f64, f64::INFINITY, 2.0];
        let err = Codec::default().to_vec_batch(&values).unwrap_err();
        assert!(matches!(err, JsonError::UnsupportedValue { .. }));
    }

    #[test]
    fn private_caches_are_isolated() {
        let cache = Arc::new(ProgramCache::new());
        let codec = Codec::with_cache(Arc::clone(&cache), Config::default());
        codec.to_vec(&7u16).unwrap();
        assert_eq!(cache.stats().dense, 1);
    }
}
