// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component D: the active-Q range selector.

use crate::frame::FrameType;
use crate::qindex::minq::get_kf_active_quality;
use crate::state::RateControlState;

/// Whether the current frame is the first intra-only frame of the stream,
/// or a forced key frame — the two cases that take the "Intra path" of
/// `active_best_quality` instead of the steady-state intra formula.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IntraPathFlags {
    pub first_intra_only_frame: bool,
    pub forced: bool,
}

impl IntraPathFlags {
    pub fn any(self) -> bool {
        self.first_intra_only_frame || self.forced
    }
}

/// `active_worst_quality` under CBR (§4.D).
///
/// `svc_base_last_kf_q` is `Some(last_q[KEY])` of the base spatial layer
/// when SVC is enabled and the base layer's current frame is a key frame,
/// per the spec's "blend in its last_q[KEY]" rule; otherwise `None`.
pub fn active_worst_quality(state: &RateControlState, svc_base_last_kf_q: Option<i32>) -> i32 {
    if matches!(state.frame_type, FrameType::Key) {
        return state.worst_quality;
    }

    let mut ambient_qp = if state.current_video_frame < 5 {
        state.avg_frame_qindex(FrameType::Inter).min(state.avg_frame_qindex(FrameType::Key))
    } else {
        state.avg_frame_qindex(FrameType::Inter)
    };

    if let Some(base_kf_q) = svc_base_last_kf_q {
        ambient_qp = (ambient_qp + base_kf_q) / 2;
    }

    let aw = state.worst_quality.min((ambient_qp * 5) / 4);

    let buffer = state.buffer.buffer_level;
    let optimal = state.buffer.optimal_buffer_level;
    let maximum = state.buffer.maximum_buffer_size;
    let critical = optimal / 8;

    if buffer > optimal {
        let buff_lvl_step = ((maximum - optimal).max(1)) / ((aw / 3).max(1) as i64);
        let adjustment = if buff_lvl_step > 0 { (buffer - optimal) / buff_lvl_step } else { 0 };
        (aw - adjustment as i32).max(0)
    } else if buffer > critical {
        let span = (optimal - critical).max(1);
        let adjustment = ((state.worst_quality - ambient_qp) as i64 * (optimal - buffer)) / span;
        ambient_qp + adjustment as i32
    } else {
        state.worst_quality
    }
}

/// `active_best_quality` under CBR (§4.D).
pub fn active_best_quality(state: &RateControlState, intra: IntraPathFlags) -> i32 {
    match state.frame_type {
        FrameType::Key if intra.any() => {
            // Intra path: use last_boosted_qindex with a delta derived from
            // a qstart -> qtarget search over the AC-quant table, so a very
            // bright/dark key frame doesn't reuse a stale boosted qindex.
            let table = &state.ac_qlookup;
            let qstart = state.last_boosted_qindex.clamp(0, table.len() as i32 - 1);
            let target_step = (crate::qindex::ac_quant(qstart, 0, table) as f64 * 0.875).round() as i32;
            let mut qtarget = qstart;
            for (idx, &step) in table.iter().enumerate() {
                if step >= target_step {
                    qtarget = idx as i32;
                    break;
                }
            }
            qtarget.clamp(state.best_quality, state.worst_quality)
        }
        FrameType::Key => {
            get_kf_active_quality(&state.min_q_tables, state.avg_frame_qindex(FrameType::Key), state.kf_boost)
        }
        FrameType::Inter => {
            let idx = state
                .avg_frame_qindex(FrameType::Inter)
                .min(state.active_worst_quality)
                .clamp(0, state.min_q_tables.rtc.len() as i32 - 1);
            state.min_q_tables.rtc[idx as usize]
        }
    }
}

/// Final clamp of §4.D: `active_best in [best_quality, worst_quality]`,
/// `active_worst in [active_best, worst_quality]`.
pub fn clamp_active_range(state: &RateControlState, active_best: i32, active_worst: i32) -> (i32, i32) {
    let best = active_best.clamp(state.best_quality, state.worst_quality);
    let worst = active_worst.clamp(best, state.worst_quality);
    (best, worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitdepth::BitDepth;
    use crate::codec::CodecKind;

    fn state() -> RateControlState {
        let mut s = RateControlState::new(CodecKind::Vp9, BitDepth::Depth8, 0, 63);
        s.set_avg_frame_qindex(FrameType::Inter, 40);
        s.set_avg_frame_qindex(FrameType::Key, 30);
        s.current_video_frame = 10;
        s.buffer.buffer_level = 600_000;
        s.buffer.optimal_buffer_level = 600_000;
        s.buffer.maximum_buffer_size = 1_000_000;
        s
    }

    #[test]
    fn key_frame_always_uses_worst_quality() {
        let mut s = state();
        s.frame_type = FrameType::Key;
        assert_eq!(active_worst_quality(&s, None), s.worst_quality);
    }

    #[test]
    fn buffer_below_critical_forces_worst_quality() {
        let mut s = state();
        s.frame_type = FrameType::Inter;
        s.buffer.buffer_level = 0;
        s.buffer.optimal_buffer_level = 600_000;
        assert_eq!(active_worst_quality(&s, None), s.worst_quality);
    }

    #[test]
    fn buffer_above_optimal_relaxes_worst_quality() {
        let mut s = state();
        s.frame_type = FrameType::Inter;
        s.buffer.buffer_level = 900_000;
        let aw = active_worst_quality(&s, None);
        assert!(aw <= s.worst_quality);
    }

    #[test]
    fn clamp_keeps_invariant_1() {
        let s = state();
        let (best, worst) = clamp_active_range(&s, -5, 1000);
        assert!(s.best_quality <= best);
        assert!(best <= worst);
        assert!(worst <= s.worst_quality);
    }
}
