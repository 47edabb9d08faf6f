//! Column-family names. Centralized so the open path and every
//! module that touches a handle agree on spelling.

pub const SPO: &str = "spo";
pub const POS: &str = "pos";
pub const OSP: &str = "osp";
pub const DERIVED: &str = "derived";
pub const TERM_TO_ID: &str = "term_to_id";
pub const ID_TO_TERM: &str = "id_to_term";
pub const NUMERIC_RANGE: &str = "numeric_range";
pub const META: &str = "meta";

pub const ALL: [&str; 8] = [SPO, POS, OSP, DERIVED, TERM_TO_ID, ID_TO_TERM, NUMERIC_RANGE, META];

/// `meta` key holding the last durably-allocated sequence number.
pub const META_SEQUENCE_COUNTER: &[u8] = b"seq:counter";

pub fn meta_statistics_key(version: u32) -> Vec<u8> {
    format!("stats:{version}:main").into_bytes()
}

pub fn meta_tbox_key(kind: &str, version: u64) -> Vec<u8> {
    format!("tbox:{kind}:{version}").into_bytes()
}
