//! On-disk graph format and warm-node cache (spec §4.6).

mod cache;
mod format;

pub use format::{record_len, write_graph, write_graph_to_path, OnDiskGraph, HEADER_LEN};
