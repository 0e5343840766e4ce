// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component C: the per-frame target-size allocator.

use crate::state::{RateControlState, FRAME_OVERHEAD_BITS};

/// Key-frame target (§4.C "Key-frame target").
///
/// `default_kf_boost` is the codec's baseline key-frame boost constant;
/// `max_intra_bitrate_pct` of `0` means "no cap".
pub fn key_frame_target(
    state: &RateControlState,
    default_kf_boost: i32,
    framerate: f64,
    max_intra_bitrate_pct: i32,
) -> i64 {
    if state.current_video_frame == 0 {
        return state.buffer.starting_buffer_level / 2;
    }

    let kf_boost = default_kf_boost.max((2.0 * framerate - 16.0) as i32);
    let mut kf_boost = kf_boost;

    // Scaled down linearly when frames_since_key < framerate / 2.
    let half_fps = (framerate / 2.0) as u64;
    if state.frames_since_key < half_fps && half_fps > 0 {
        kf_boost = ((kf_boost as u64 * state.frames_since_key) / half_fps) as i32;
    }

    let mut target = ((16 + kf_boost) as i64 * state.avg_frame_bandwidth) >> 4;

    if max_intra_bitrate_pct > 0 {
        let cap = state.avg_frame_bandwidth * max_intra_bitrate_pct as i64 / 100;
        target = target.min(cap);
    }

    target.min(state.max_frame_bandwidth)
}

/// Inter-frame target (§4.C "Inter-frame target"), operating on an explicit
/// `avg_bandwidth` so SVC layers can pass their own `avg_frame_size`.
#[allow(clippy::too_many_arguments)]
pub fn inter_frame_target(
    avg_bandwidth: i64,
    optimal_buffer_level: i64,
    buffer_level: i64,
    undershoot_pct: i32,
    overshoot_pct: i32,
    max_inter_bitrate_pct: i32,
    min_frame_bandwidth: i64,
) -> i64 {
    let mut target = avg_bandwidth;
    let diff = optimal_buffer_level - buffer_level;
    let one_pct = 1 + optimal_buffer_level / 100;

    if diff > 0 {
        let pct_low = (diff / one_pct.max(1)).min(undershoot_pct as i64);
        target -= target * pct_low / 200;
    } else if diff < 0 {
        let pct_high = ((-diff) / one_pct.max(1)).min(overshoot_pct as i64);
        target += target * pct_high / 200;
    }

    if max_inter_bitrate_pct > 0 {
        let cap = avg_bandwidth * max_inter_bitrate_pct as i64 / 100;
        target = target.min(cap);
    }

    target.max(min_frame_bandwidth)
}

/// `min_frame_bandwidth = max(avg_frame_bandwidth >> 4, FRAME_OVERHEAD_BITS)` (§4.C).
pub fn min_frame_bandwidth(avg_frame_bandwidth: i64) -> i64 {
    (avg_frame_bandwidth >> 4).max(FRAME_OVERHEAD_BITS)
}

/// The VP8-specific inter-frame target variant (§4.C "VP8 variant"):
/// additionally subtracts a proportional recovery adjustment for
/// accumulated key/golden-frame overspend.
///
/// The reference source gates a buffer-driven `active_worst_quality`
/// adjustment here behind a `buffered_mode` flag, using a `qadjustment_range`
/// shift-by-2 formula whose scaling constants aren't cross-referenced
/// elsewhere in the source (§9 Open Question 5). This implementation
/// preserves the *shape* of that adjustment — nudge `active_worst_quality`
/// toward `worst_quality` in proportion to how far the buffer has drained
/// below optimal, capped to a quarter of the active range — without
/// claiming bit-exactness for the specific constants.
pub fn vp8_pframe_target(
    state: &mut RateControlState,
    undershoot_pct: i32,
    overshoot_pct: i32,
    max_inter_bitrate_pct: i32,
) -> i64 {
    let mut target = inter_frame_target(
        state.avg_frame_bandwidth,
        state.buffer.optimal_buffer_level,
        state.buffer.buffer_level,
        undershoot_pct,
        overshoot_pct,
        max_inter_bitrate_pct,
        min_frame_bandwidth(state.avg_frame_bandwidth),
    );

    let overspend = state.kf_overspend_bits + state.gf_overspend_bits;
    if overspend > 0 {
        let recovery_frames = 8;
        let adjustment = (overspend / recovery_frames).min(target / 2);
        target -= adjustment;
        state.kf_overspend_bits -= state.kf_overspend_bits.min(adjustment);
        state.gf_overspend_bits -= state.gf_overspend_bits.min(adjustment.saturating_sub(state.kf_overspend_bits));
    }

    if state.buffer.buffer_level < state.buffer.optimal_buffer_level {
        let shortfall = state.buffer.optimal_buffer_level - state.buffer.buffer_level;
        let range = (state.worst_quality - state.active_worst_quality).max(0);
        let qadjustment_range = state.buffer.optimal_buffer_level.max(1);
        let bump = ((range as i64 * shortfall) / qadjustment_range / 4) as i32;
        state.active_worst_quality = (state.active_worst_quality + bump).min(state.worst_quality);
    }

    target.max(min_frame_bandwidth(state.avg_frame_bandwidth))
}
