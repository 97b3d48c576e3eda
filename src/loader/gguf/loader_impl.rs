//! GGUF Loader Implementation
//!
//! - [`parse_gguf_bytes`]: parse a header from a buffer that may be a prefix
//! - [`parse_gguf`]: read a growing prefix from a [`RangeReader`] until the
//!   header fits

use super::{
    align_offset, measure_unknown_sizes, parse_gguf_header, parse_tensor_info, read_kv_pair,
    GgufError, GgufFile, GgufMetadataTable, HeaderConfig, GGUF_ALIGNMENT,
};
use crate::error::{AtlasError, AtlasResult};
use crate::loader::cursor::ByteCursor;
use crate::loader::mmap::RangeReader;
use crate::progress::{report, ProgressFn, ProgressPhase};

/// Parse a GGUF header from `bytes`
///
/// `bytes` only needs to cover the header; tensor data is not inspected.
/// Fails with [`GgufError::InsufficientData`] if the buffer ends early.
pub fn parse_gguf_bytes(
    bytes: &[u8],
    progress: Option<&ProgressFn>,
) -> Result<GgufFile, GgufError> {
    let mut cursor = ByteCursor::new(bytes);
    let header = parse_gguf_header(&mut cursor)?;

    let total = header.kv_count.saturating_add(header.tensor_count);
    let mut done = 0u64;

    // Each KV pair takes at least 12 bytes, so cap the reservation by what
    // the buffer could possibly hold.
    let kv_capacity = header.kv_count.min((cursor.remaining() / 12) as u64) as usize;
    let mut entries = Vec::with_capacity(kv_capacity);
    for _ in 0..header.kv_count {
        entries.push(read_kv_pair(&mut cursor)?);
        done += 1;
        report(progress, ProgressPhase::HeaderParsing, done, total);
    }
    let metadata = GgufMetadataTable::from_entries(entries);

    let tensor_capacity = header.tensor_count.min((cursor.remaining() / 32) as u64) as usize;
    let mut tensors = Vec::with_capacity(tensor_capacity);
    for _ in 0..header.tensor_count {
        tensors.push(parse_tensor_info(&mut cursor)?);
        done += 1;
        report(progress, ProgressPhase::HeaderParsing, done, total);
    }

    let tensor_info_end = cursor.position() as u64;
    let data_offset = align_offset(tensor_info_end, GGUF_ALIGNMENT);

    tracing::debug!(
        "Parsed GGUF v{} header: {} metadata entries, {} tensors, data at {}",
        header.version,
        metadata.len(),
        tensors.len(),
        data_offset
    );

    Ok(GgufFile {
        version: header.version,
        metadata,
        tensors,
        data_offset,
        tensor_info_end,
    })
}

/// Parse the GGUF header of `source`, growing the read until it fits
///
/// Starts with `config.initial_read_bytes` (capped at the file length) and
/// multiplies by `config.growth_factor` after every insufficient-data
/// failure. Once the read covers the whole file, insufficient data means
/// the file is truncated. Format errors are returned without retrying.
pub fn parse_gguf(
    source: &dyn RangeReader,
    config: &HeaderConfig,
    progress: Option<&ProgressFn>,
) -> AtlasResult<GgufFile> {
    config.validate()?;

    let file_len = source.len();
    let mut read_size = config.initial_read_bytes.min(file_len);
    let mut attempt = 1u32;

    loop {
        let len = usize::try_from(read_size).map_err(|_| {
            crate::internal_error!("header read of {} bytes exceeds address space", read_size)
        })?;
        let bytes = source.read_range(0, len)?;

        match parse_gguf_bytes(&bytes, progress) {
            Ok(mut file) => {
                let data_len = file_len.saturating_sub(file.data_offset);
                measure_unknown_sizes(&mut file.tensors, data_len);
                tracing::info!(
                    "GGUF header parsed after {} attempt(s): {} tensors, {} metadata entries",
                    attempt,
                    file.tensors.len(),
                    file.metadata.len()
                );
                return Ok(file);
            }
            Err(GgufError::InsufficientData(short)) => {
                if read_size >= file_len {
                    return Err(AtlasError::Format(GgufError::Truncated {
                        file_len,
                        position: short.position,
                        needed: short.needed,
                    }));
                }
                let next = config.next_read_size(read_size, file_len);
                tracing::debug!(
                    "GGUF header larger than {} bytes (short at {}), retrying with {}",
                    read_size,
                    short.position,
                    next
                );
                read_size = next;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
