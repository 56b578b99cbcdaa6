use chrono::{SecondsFormat, Utc};

const TEMP_ID_PREFIX: &str = "temp-";

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// RFC 3339 timestamp used for locally stamped `createdAt`/`updatedAt`.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn random_u32() -> u32 {
    let mut buf = [0u8; 4];
    // Falling back to the clock keeps ids unique enough for a single session.
    if getrandom::getrandom(&mut buf).is_err() {
        return (now_ms() as u32).rotate_left(13);
    }
    u32::from_le_bytes(buf)
}

pub(crate) fn make_temp_block_id(now_ms: i64, rand: u32) -> String {
    format!("{TEMP_ID_PREFIX}{now_ms}-{rand}")
}

pub(crate) fn new_temp_block_id() -> String {
    make_temp_block_id(now_ms(), random_u32())
}

/// Temporary ids live until the next successful save round-trip.
pub fn is_temp_block_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
