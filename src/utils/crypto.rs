use ring::digest::{Context, SHA256, SHA384};

use crate::error::{Result, TangleError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in seconds, the unit every persisted timestamp uses
pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| TangleError::Io(format!("System time error: {e}")))?
        .as_secs();

    if duration > i64::MAX as u64 {
        return Err(TangleError::Io("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

/// Same as `current_timestamp`, falling back to 0 on a broken clock
pub fn now_secs() -> i64 {
    current_timestamp().unwrap_or_else(|e| {
        log::error!("{e}");
        0
    })
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn sha384_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA384);
    context.update(data);
    context.finish().as_ref().to_vec()
}

pub fn hex_decode(data: &str) -> Result<Vec<u8>> {
    hex::decode(data.trim()).map_err(|e| TangleError::Serialization(format!("Invalid hex: {e}")))
}
