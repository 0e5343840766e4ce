// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component E: the Q-regulator binary search and CBR post-adjustment.

use crate::bitdepth::BitDepth;
use crate::codec::CodecKind;
use crate::frame::FrameType;
use crate::qindex::estimate_bits_at_q;

/// Parameters the regulator needs that don't live on `RateControlState`
/// directly (kept explicit so this module has no engine-specific coupling).
#[derive(Copy, Clone, Debug)]
pub struct RegulateParams<'a> {
    pub codec: CodecKind,
    pub frame_type: FrameType,
    pub bit_depth: BitDepth,
    pub ac_qlookup: &'a [i32],
    pub correction_factor: f64,
    pub mbs: u32,
    pub is_screen_content: bool,
}

/// Binary search for the qindex in `[active_best, active_worst]` whose
/// estimated bits are closest to `target_bits` (§4.E).
///
/// Tie-break rule: when the candidate just below the search boundary and the
/// boundary itself are equally close to the target, the *higher* qindex
/// wins — biasing toward undershoot rather than overshoot, since an
/// overshoot risks a buffer underflow while an undershoot only wastes a few
/// bits of headroom.
pub fn regulate_q(target_bits: i64, active_best: i32, active_worst: i32, params: &RegulateParams) -> i32 {
    if active_best >= active_worst {
        return active_worst;
    }

    let bits_at = |q: i32| -> i64 {
        estimate_bits_at_q(
            params.codec,
            params.frame_type,
            q,
            params.mbs,
            params.correction_factor,
            params.bit_depth,
            params.ac_qlookup,
            params.is_screen_content,
        ) as i64
    };

    let mut low = active_best;
    let mut high = active_worst;

    // Bits are monotonically non-increasing in q, so a plain binary search
    // finds the smallest q whose estimate is <= target.
    while low < high {
        let mid = low + (high - low) / 2;
        if bits_at(mid) > target_bits {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    if low > active_best {
        let lower = low - 1;
        let diff_lower = (bits_at(lower) - target_bits).abs();
        let diff_here = (bits_at(low) - target_bits).abs();
        if diff_lower < diff_here {
            return lower;
        }
    }

    low
}

/// Everything `adjust_q_cbr` needs about history and stream topology that
/// isn't already captured by the q/target arguments themselves.
#[derive(Copy, Clone, Debug)]
pub struct CbrAdjustParams {
    pub frame_type: FrameType,
    pub is_svc: bool,
    pub frames_since_key: u64,

    /// The previous two frames' final qindex/rate-correction-delta sign,
    /// used to detect and damp Q oscillation.
    pub q_1_frame: i32,
    pub q_2_frame: i32,
    pub rc_1_frame: i32,
    pub rc_2_frame: i32,

    pub avg_frame_bandwidth: i64,
    pub prev_avg_frame_bandwidth: i64,

    pub width: u32,
    pub height: u32,
    pub prev_width: u32,
    pub prev_height: u32,
    pub has_prev_frame: bool,

    pub best_quality: i32,
    pub worst_quality: i32,
}

const MAX_DELTA: i32 = 16;

/// CBR post-adjustment (§4.E `adjust_q_cbr`): clamps `q` between the last
/// two frames' Q when they're oscillating, caps how far `q` can drop from
/// the previous frame's Q, and pushes `q` toward `active_worst_quality` on
/// a large resolution increase. Scene-detection-driven Q pushes (gated on
/// `avg_source_sad` history this crate doesn't track) are intentionally not
/// reproduced here.
pub fn adjust_q_cbr(q: i32, active_worst_quality: i32, p: &CbrAdjustParams) -> i32 {
    let mut q = q;

    let change_avg_frame_bandwidth = (p.avg_frame_bandwidth - p.prev_avg_frame_bandwidth).abs() as f64
        > 0.1 * p.avg_frame_bandwidth as f64;
    let change_target_bits_mb =
        p.has_prev_frame && (p.width != p.prev_width || p.height != p.prev_height || change_avg_frame_bandwidth);

    if !matches!(p.frame_type, FrameType::Key) && !p.is_svc && p.frames_since_key > 1 && !change_target_bits_mb {
        if p.rc_1_frame * p.rc_2_frame == -1 && p.q_1_frame != p.q_2_frame {
            q = q.clamp(p.q_1_frame.min(p.q_2_frame), p.q_1_frame.max(p.q_2_frame));
        }
        if p.q_1_frame - q > MAX_DELTA {
            q = p.q_1_frame - MAX_DELTA;
        }
    }

    if !p.is_svc
        && p.has_prev_frame
        && (p.width as i64 * p.height as i64) as f64 > 1.5 * (p.prev_width as i64 * p.prev_height as i64) as f64
    {
        q = (q + active_worst_quality) / 2;
    }

    q.clamp(p.best_quality, p.worst_quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(table: &[i32]) -> RegulateParams {
        RegulateParams {
            codec: CodecKind::Vp9,
            frame_type: FrameType::Inter,
            bit_depth: BitDepth::Depth8,
            ac_qlookup: table,
            correction_factor: 1.0,
            mbs: 3600,
            is_screen_content: false,
        }
    }

    fn table() -> Vec<i32> {
        crate::qindex::build_ac_qlookup(256, BitDepth::Depth8)
    }

    fn cbr_params() -> CbrAdjustParams {
        CbrAdjustParams {
            frame_type: FrameType::Inter,
            is_svc: false,
            frames_since_key: 10,
            q_1_frame: 100,
            q_2_frame: 100,
            rc_1_frame: 0,
            rc_2_frame: 0,
            avg_frame_bandwidth: 10_000,
            prev_avg_frame_bandwidth: 10_000,
            width: 1280,
            height: 720,
            prev_width: 1280,
            prev_height: 720,
            has_prev_frame: true,
            best_quality: 0,
            worst_quality: 255,
        }
    }

    #[test]
    fn regulate_q_picks_within_active_range() {
        let table = table();
        let p = params(&table);
        let q = regulate_q(50_000, 10, 200, &p);
        assert!((10..=200).contains(&q));
    }

    #[test]
    fn regulate_q_degenerate_range_returns_worst() {
        let table = table();
        let p = params(&table);
        assert_eq!(regulate_q(50_000, 80, 80, &p), 80);
    }

    #[test]
    fn higher_target_bits_selects_lower_or_equal_q() {
        let table = table();
        let p = params(&table);
        let q_small_target = regulate_q(1_000, 0, 255, &p);
        let q_large_target = regulate_q(1_000_000, 0, 255, &p);
        assert!(q_large_target <= q_small_target);
    }

    #[test]
    fn adjust_q_cbr_stays_within_best_worst_bounds() {
        let p = cbr_params();
        let q = adjust_q_cbr(100, 200, &p);
        assert!((p.best_quality..=p.worst_quality).contains(&q));
    }

    #[test]
    fn oscillation_clamps_q_between_history() {
        let mut p = cbr_params();
        p.q_1_frame = 50;
        p.q_2_frame = 150;
        p.rc_1_frame = 1;
        p.rc_2_frame = -1;
        let q = adjust_q_cbr(200, 200, &p);
        assert!((50..=150).contains(&q));
    }

    #[test]
    fn decrease_from_previous_q_is_capped() {
        let mut p = cbr_params();
        p.q_1_frame = 200;
        let q = adjust_q_cbr(50, 200, &p);
        assert_eq!(q, 200 - MAX_DELTA);
    }

    #[test]
    fn large_resolution_increase_pushes_toward_active_worst() {
        let mut p = cbr_params();
        p.prev_width = 640;
        p.prev_height = 360;
        p.frames_since_key = 0;
        let q = adjust_q_cbr(50, 200, &p);
        assert_eq!(q, (50 + 200) / 2);
    }

    #[test]
    fn svc_disables_both_adjustments() {
        let mut p = cbr_params();
        p.is_svc = true;
        p.q_1_frame = 200;
        p.prev_width = 640;
        p.prev_height = 360;
        let q = adjust_q_cbr(50, 200, &p);
        assert_eq!(q, 50);
    }
}
