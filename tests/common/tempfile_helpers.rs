//! Helper functions for tempfile usage in tests

use anyhow::Context;

use super::fixtures::GgufBuilder;

/// Write a synthetic model to a `.gguf` temp file
///
/// The file is deleted when the returned handle drops.
pub fn write_temp_gguf(builder: &GgufBuilder) -> anyhow::Result<tempfile::NamedTempFile> {
    let file = tempfile::NamedTempFile::with_suffix(".gguf")
        .context("Failed to create temporary .gguf file")?;
    builder
        .write_to(file.path())
        .context("Failed to write synthetic GGUF")?;
    Ok(file)
}
