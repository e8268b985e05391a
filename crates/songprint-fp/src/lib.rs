//! Songprint catalog entry file format library

pub mod entry_file;

pub use entry_file::{
    EntryDescriptors, EntryFile, EntryFileError, EntryFormat, EntryMetadata, ENTRY_FILE_VERSION,
};
