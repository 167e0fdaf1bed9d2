//! Data model for export operations
//!
//! - `command`: the immutable export request and its builder
//! - `cursor`: the sort cursor used to resume after the last seen record
//! - `hit`: raw search hits as returned by the backend
//! - `chunk`: projected records grouped into delivered chunks

pub mod chunk;
pub mod command;
pub mod cursor;
pub mod hit;

pub use chunk::{Chunk, FieldValue, Record};
pub use command::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FIELDS, ExportCommand, ExportCommandBuilder, Filter, TimeRange,
};
pub use cursor::{SortCursor, TieBreaker};
pub use hit::SearchHit;
