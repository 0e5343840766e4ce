// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component F: the post-encode rate-correction factor update (§4.F).

use log::debug;

use crate::codec::CodecKind;
use crate::frame::FrameType;
use crate::state::FRAME_OVERHEAD_BITS;

/// Which of a codec's rate-factor slots a frame's correction factor update
/// applies to. Only two slots are ever written by this crate — see
/// [`crate::codec::CodecKind::rate_factor_levels`] for why the others exist.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RateFactorLevel {
    KfStd,
    InterNormal,
}

impl RateFactorLevel {
    pub fn index(self) -> usize {
        match self {
            RateFactorLevel::KfStd => 0,
            RateFactorLevel::InterNormal => 1,
        }
    }

    pub fn for_frame(frame_type: FrameType) -> Self {
        match frame_type {
            FrameType::Key => RateFactorLevel::KfStd,
            FrameType::Inter => RateFactorLevel::InterNormal,
        }
    }
}

/// Updates `rate_correction_factors[level]` in place from one frame's
/// expected-vs-actual encoded size, following the reference encoders' 7-step
/// procedure:
///
/// 1. `correction_pct = 100 * actual / expected`, gated on `expected >
///    FRAME_OVERHEAD_BITS` (else defaults to 100 — no adjustment).
/// 2. The first update of a given rate-factor level runs undamped
///    (`adjustment_limit = 1.0`); every later update damps by
///    `0.25 + 0.5 * min(1, |log10(0.01 * correction_pct)|)`.
/// 3. `q_1_frame`/`q_2_frame` shift in this frame's final qindex.
/// 4. `rc_1_frame`/`rc_2_frame` shift in a `-1`/`0`/`1` oscillation-direction
///    marker (`correction_pct > 110` / `< 90` / neither).
/// 5. A massive overshoot (`correction_pct > 1000`) right after an
///    undershoot resets `rc_2_frame` to disable oscillation detection for
///    one frame — otherwise the false "resonance" reading from the spike
///    would clamp the next frame's Q to this frame's outlier.
/// 6. Only `correction_pct > 102` (scale up) or `< 99` (scale down) actually
///    move the factor; both are clamped to the codec's real
///    `min_bpb_factor`/`max_bpb_factor` (§6.3), not a fixed constant.
/// 7. Log the before/after for diagnosability.
#[allow(clippy::too_many_arguments)]
pub fn update_rate_correction_factor(
    factors: &mut [f64],
    damped_adjustment: &mut [bool],
    level: RateFactorLevel,
    codec: CodecKind,
    expected_bits: i64,
    actual_bits: i64,
    this_frame_qindex: i32,
    q_1_frame: &mut i32,
    q_2_frame: &mut i32,
    rc_1_frame: &mut i32,
    rc_2_frame: &mut i32,
) {
    let idx = level.index().min(factors.len().saturating_sub(1));
    let before = factors[idx];

    let correction_pct: i64 =
        if expected_bits > FRAME_OVERHEAD_BITS { (100 * actual_bits) / expected_bits } else { 100 };

    let adjustment_limit = if !damped_adjustment[idx] {
        damped_adjustment[idx] = true;
        1.0
    } else {
        0.25 + 0.5 * (0.01 * correction_pct as f64).log10().abs().min(1.0)
    };

    *q_2_frame = *q_1_frame;
    *q_1_frame = this_frame_qindex;
    *rc_2_frame = *rc_1_frame;
    *rc_1_frame = if correction_pct > 110 {
        -1
    } else if correction_pct < 90 {
        1
    } else {
        0
    };

    if *rc_1_frame == -1 && *rc_2_frame == 1 && correction_pct > 1000 {
        *rc_2_frame = 0;
    }

    let limits = codec.limits();
    let mut after = before;
    if correction_pct > 102 {
        let scaled_pct = 100.0 + (correction_pct as f64 - 100.0) * adjustment_limit;
        after = (before * scaled_pct / 100.0).min(limits.max_bpb_factor);
    } else if correction_pct < 99 {
        let scaled_pct = 100.0 - (100.0 - correction_pct as f64) * adjustment_limit;
        after = (before * scaled_pct / 100.0).max(limits.min_bpb_factor);
    }

    factors[idx] = after;

    debug!(
        "rate correction[{:?}]: {:.4} -> {:.4} (actual={} expected={} pct={})",
        level, before, after, actual_bits, expected_bits, correction_pct
    );
}
