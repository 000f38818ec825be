pub mod block_scan;
pub mod scan;
