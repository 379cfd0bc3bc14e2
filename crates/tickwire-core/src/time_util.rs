//! Epoch timestamp helpers.
//!
//! Tick records carry their observation time in whole seconds since the Unix
//! epoch, stamped at receipt.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as **seconds** since Unix epoch.
#[inline]
pub fn now_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_past_epoch() {
        // 2023-01-01T00:00:00Z; a zeroed or wildly wrong clock fails here.
        assert!(now_s() > 1_672_531_200);
    }
}
