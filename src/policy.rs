//! Decides whether a playback position is worth persisting.

use crate::config::Config;

/// Position to persist for a closing item, or `None` meaning any existing
/// record should be purged instead.
///
/// A position is savable when playback got past the minimum runtime plus the
/// rewind offset but has not yet reached the end guard of the stream length.
/// The persisted position is rewound by `rewind_ms`; a computed position of
/// 0 is treated as non-savable since resuming at the start is meaningless.
pub fn savable_position(
    current_time_ms: u64,
    stream_length_ms: u64,
    config: &Config,
) -> Option<u64> {
    if current_time_ms == 0
        || current_time_ms < config.min_runtime_ms + config.rewind_ms
        || current_time_ms >= stream_length_ms.saturating_sub(config.max_runtime_ms)
    {
        return None;
    }
    match current_time_ms.saturating_sub(config.rewind_ms) {
        0 => None,
        position_ms => Some(position_ms),
    }
}
