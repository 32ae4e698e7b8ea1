pub mod text;

pub use text::{
    Chunk, ContextError, DEFAULT_BOUNDARIES, TextChunker, assemble_context, clean_text,
};
