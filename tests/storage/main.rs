mod blob_test;
mod header_test;
mod validation_test;
mod view_test;
