//! Model file access and GGUF header parsing

pub mod cursor;
pub mod gguf;
pub mod mmap;
pub mod tensor_type;

pub use cursor::{ByteCursor, InsufficientData};
pub use gguf::{parse_gguf, GgufError, GgufFile, GgufMetadataTable, HeaderConfig, TensorDescriptor};
pub use mmap::{MemorySource, MmapGguf, RangeReader};
pub use tensor_type::{GgufTensorType, SampleDecode};
