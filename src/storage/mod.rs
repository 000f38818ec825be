pub mod blob;
pub mod buffer;
pub mod charset;
pub mod decoder;
pub mod files;
pub mod header;
pub mod index;
pub mod table;
pub mod validation;
pub mod view;
