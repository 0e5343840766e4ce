// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The shared per-engine rate control state of §3.1, common to all three
//! codec backends. Each codec's engine owns one `RateControlState` plus a
//! per-layer array of [`crate::svc::LayerContext`] that mirror its shape.

use crate::bitdepth::BitDepth;
use crate::buffer::BufferModel;
use crate::codec::CodecKind;
use crate::frame::FrameType;
use crate::qindex::MinQTables;

pub const FRAME_OVERHEAD_BITS: i64 = 200;

fn frame_type_index(frame_type: FrameType) -> usize {
    match frame_type {
        FrameType::Key => 0,
        FrameType::Inter => 1,
    }
}

/// Full mutable rate control state for one engine (or one SVC layer).
#[derive(Clone, Debug)]
pub struct RateControlState {
    // Target tracking.
    pub this_frame_target: i64,
    pub base_frame_target: i64,
    pub projected_frame_size: i64,
    pub rolling_target_bits: i64,
    pub rolling_actual_bits: i64,
    pub total_actual_bits: i64,
    pub total_target_bits: i64,

    // Buffer.
    pub buffer: BufferModel,

    // Bandwidth.
    pub avg_frame_bandwidth: i64,
    pub min_frame_bandwidth: i64,
    pub max_frame_bandwidth: i64,
    pub last_avg_frame_bandwidth: i64,

    // Q history.
    last_q: [i32; 2],
    avg_frame_qindex: [i32; 2],
    pub last_boosted_qindex: i32,
    pub last_kf_qindex: i32,
    pub q_1_frame: i32,
    pub q_2_frame: i32,
    pub rc_1_frame: i32,
    pub rc_2_frame: i32,

    // Correction factors, one per rate-factor level (§codec::rate_factor_levels).
    pub rate_correction_factors: Vec<f64>,
    /// Whether a rate-factor level's very first correction-factor update
    /// (undamped, per §4.F step 3) has already happened.
    pub damped_adjustment: Vec<bool>,

    // Key-frame cadence.
    pub frames_since_key: u64,
    pub frames_to_key: u64,
    pub kf_boost: i32,
    pub this_key_frame_forced: bool,

    // Quality limits.
    pub best_quality: i32,
    pub worst_quality: i32,
    pub active_best_quality: i32,
    pub active_worst_quality: i32,

    // GF cadence (VP8/VP9).
    pub frames_till_gf_update_due: u64,
    pub gf_noboost_onepass_cbr: bool,
    pub baseline_gf_interval: u64,
    pub gf_overspend_bits: i64,
    pub kf_overspend_bits: i64,

    // Counters.
    pub ni_frames: u64,
    pub ni_tot_qi: i64,
    pub ni_av_qi: i32,
    pub tot_q: f64,
    pub avg_q: f64,

    // Common per-frame fields.
    pub width: u32,
    pub height: u32,
    pub base_qindex: i32,
    pub mbs: u32,
    pub frame_type: FrameType,
    pub show_frame: bool,
    pub current_video_frame: u64,
    pub bit_depth: BitDepth,

    pub min_q_tables: MinQTables,
    pub ac_qlookup: Vec<i32>,

    // Previous-frame snapshot for `adjust_q_cbr`'s resolution/bandwidth-jump
    // detection (§4.E).
    pub prev_avg_frame_bandwidth: i64,
    pub prev_width: u32,
    pub prev_height: u32,
    pub has_prev_frame: bool,
}

impl RateControlState {
    /// Allocates a fresh, zeroed state for `codec` with tables built for
    /// `maxq`/`bit_depth` and quality bounds `[best_quality,
    /// worst_quality]`. Buffer/bandwidth fields are left at their defaults;
    /// the caller (engine `init`) seeds them from config afterward.
    pub fn new(codec: CodecKind, bit_depth: BitDepth, best_quality: i32, worst_quality: i32) -> Self {
        let limits = codec.limits();
        let ac_qlookup = crate::qindex::build_ac_qlookup(limits.q_range as usize, bit_depth);
        let min_q_tables = MinQTables::build(codec, bit_depth, &ac_qlookup);
        RateControlState {
            this_frame_target: 0,
            base_frame_target: 0,
            projected_frame_size: 0,
            rolling_target_bits: 0,
            rolling_actual_bits: 0,
            total_actual_bits: 0,
            total_target_bits: 0,
            buffer: BufferModel::default(),
            avg_frame_bandwidth: 0,
            min_frame_bandwidth: 0,
            max_frame_bandwidth: 0,
            last_avg_frame_bandwidth: 0,
            last_q: [best_quality, best_quality],
            avg_frame_qindex: [best_quality, best_quality],
            last_boosted_qindex: best_quality,
            last_kf_qindex: best_quality,
            q_1_frame: best_quality,
            q_2_frame: best_quality,
            rc_1_frame: 0,
            rc_2_frame: 0,
            rate_correction_factors: vec![1.0; codec.rate_factor_levels().max(1)],
            damped_adjustment: vec![false; codec.rate_factor_levels().max(1)],
            frames_since_key: 0,
            frames_to_key: 0,
            kf_boost: 0,
            this_key_frame_forced: false,
            best_quality,
            worst_quality,
            active_best_quality: best_quality,
            active_worst_quality: worst_quality,
            frames_till_gf_update_due: 0,
            gf_noboost_onepass_cbr: false,
            baseline_gf_interval: 0,
            gf_overspend_bits: 0,
            kf_overspend_bits: 0,
            ni_frames: 0,
            ni_tot_qi: 0,
            ni_av_qi: 0,
            tot_q: 0.0,
            avg_q: 0.0,
            width: 0,
            height: 0,
            base_qindex: 0,
            mbs: 0,
            frame_type: FrameType::Inter,
            show_frame: true,
            current_video_frame: 0,
            bit_depth,
            ac_qlookup,
            min_q_tables,
            prev_avg_frame_bandwidth: 0,
            prev_width: 0,
            prev_height: 0,
            has_prev_frame: false,
        }
    }

    pub fn last_q(&self, frame_type: FrameType) -> i32 {
        self.last_q[frame_type_index(frame_type)]
    }

    pub fn set_last_q(&mut self, frame_type: FrameType, value: i32) {
        self.last_q[frame_type_index(frame_type)] = value;
    }

    pub fn avg_frame_qindex(&self, frame_type: FrameType) -> i32 {
        self.avg_frame_qindex[frame_type_index(frame_type)]
    }

    pub fn set_avg_frame_qindex(&mut self, frame_type: FrameType, value: i32) {
        self.avg_frame_qindex[frame_type_index(frame_type)] = value;
    }

    /// Updates the rolling average qindex for `frame_type`, following the
    /// reference encoders' exponential-moving-average convention (weight
    /// 7/8 old, 1/8 new) once warmed up, and a plain running mean for the
    /// first few frames of that type.
    pub fn update_avg_frame_qindex(&mut self, frame_type: FrameType, qindex: i32) {
        let idx = frame_type_index(frame_type);
        let prev = self.avg_frame_qindex[idx];
        self.avg_frame_qindex[idx] = ((prev * 7) + qindex + 4) / 8;
    }
}
