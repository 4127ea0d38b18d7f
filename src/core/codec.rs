/*!
 * Value Codecs
 * Pluggable encoding of typed values onto raw byte streams
 *
 * The memory layer only moves bytes. Typed reads and writes go through a
 * codec, so the binary format is chosen by the caller.
 */

use super::types::Size;
use crate::memory::types::{MemoryError, MemoryResult};
use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{Read, Write};

/// Encoder/decoder of typed values over byte streams
pub trait Codec: Send + Sync {
    /// Encode `value` into `out`
    fn encode<T: Serialize + ?Sized>(&self, value: &T, out: &mut dyn Write) -> MemoryResult<()>;

    /// Decode one value from `input`, consuming only the bytes it needs
    ///
    /// At most `limit` bytes are read. Length prefixes claiming more are
    /// rejected before anything is allocated for them.
    fn decode<T: DeserializeOwned>(&self, input: &mut dyn Read, limit: Size) -> MemoryResult<T>;
}

/// Compact binary codec backed by bincode
///
/// Default codec for typed space I/O. Values carry their own length, so a
/// value decodes from a larger block without a terminator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Fixed-width integers and trailing padding, as laid out in a block
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
    }
}

impl Codec for BincodeCodec {
    #[inline]
    fn encode<T: Serialize + ?Sized>(&self, value: &T, out: &mut dyn Write) -> MemoryResult<()> {
        Self::options()
            .serialize_into(out, value)
            .map_err(|e| MemoryError::Codec(format!("bincode serialization error: {}", e)))
    }

    #[inline]
    fn decode<T: DeserializeOwned>(&self, input: &mut dyn Read, limit: Size) -> MemoryResult<T> {
        Self::options()
            .with_limit(limit as u64)
            .deserialize_from(input)
            .map_err(|e| MemoryError::Codec(format!("bincode deserialization error: {}", e)))
    }
}

/// Human-readable codec backed by serde_json
///
/// Decoding stops after the first complete value, so the padding that
/// follows it inside a block is never inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T, out: &mut dyn Write) -> MemoryResult<()> {
        serde_json::to_writer(out, value)
            .map_err(|e| MemoryError::Codec(format!("json serialization error: {}", e)))
    }

    fn decode<T: DeserializeOwned>(&self, input: &mut dyn Read, limit: Size) -> MemoryResult<T> {
        let mut deserializer = serde_json::Deserializer::from_reader(input.take(limit as u64));
        T::deserialize(&mut deserializer)
            .map_err(|e| MemoryError::Codec(format!("json deserialization error: {}", e)))
    }
}
