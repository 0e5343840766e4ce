// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component A: Q-index tables & conversions.

pub mod minq;
pub mod tables;

pub use minq::MinQTables;
pub use tables::{ac_quant, build_ac_qlookup, convert_qindex_to_q, quantizer_to_qindex};

use crate::bitdepth::BitDepth;
use crate::codec::CodecKind;
use crate::frame::FrameType;

/// `bits_per_mb`'s right-shift before reporting a frame-size estimate in
/// bits (`BPER_MB_NORMBITS` in the reference encoders).
const BPER_MB_NORMBITS: u32 = 9;

/// VP9's `>>12` enumerator adjustment: as `qindex` rises, the nominal
/// enumerator is nudged up slightly to compensate for the AC-quant table's
/// coarsening step size at high Q.
fn vp9_enumerator_adjustment(enumerator: f64, qindex: i32) -> f64 {
    enumerator + ((enumerator as i64 * qindex as i64) >> 12) as f64
}

/// The `enumerator` constant of §4.A's `bits_per_mb`, piecewise over
/// `(codec, frame_type, screen_content)`. VP9 and AV1 use distinct
/// constants and VP9 alone applies a qindex-dependent adjustment term.
fn bits_per_mb_enumerator(codec: CodecKind, frame_type: FrameType, qindex: i32, is_screen_content: bool) -> f64 {
    match codec {
        CodecKind::Vp9 => {
            let base = match frame_type {
                FrameType::Key => 2_700_000.0,
                FrameType::Inter => 1_800_000.0,
            };
            vp9_enumerator_adjustment(base, qindex)
        }
        CodecKind::Av1 if is_screen_content => match frame_type {
            FrameType::Key => 1_000_000.0,
            FrameType::Inter => 750_000.0,
        },
        _ => match frame_type {
            FrameType::Key => 2_000_000.0,
            FrameType::Inter => 1_500_000.0,
        },
    }
}

/// `bits_per_mb(frame_type, qindex, correction_factor, bit_depth[,
/// is_screen_content]) → enumerator * correction_factor / q_step` (§4.A).
pub fn bits_per_mb(
    codec: CodecKind,
    frame_type: FrameType,
    qindex: i32,
    correction_factor: f64,
    bit_depth: BitDepth,
    table: &[i32],
    is_screen_content: bool,
) -> f64 {
    let q_step = ac_quant(qindex, 0, table).max(1) as f64;
    let enumerator = bits_per_mb_enumerator(codec, frame_type, qindex, is_screen_content);
    enumerator * correction_factor / q_step
}

/// `estimate_bits_at_q`: `bits_per_mb × MBs`, normalized by
/// `BPER_MB_NORMBITS` (§4.A).
pub fn estimate_bits_at_q(
    codec: CodecKind,
    frame_type: FrameType,
    qindex: i32,
    mbs: u32,
    correction_factor: f64,
    bit_depth: BitDepth,
    table: &[i32],
    is_screen_content: bool,
) -> u64 {
    let bpm = bits_per_mb(codec, frame_type, qindex, correction_factor, bit_depth, table, is_screen_content);
    let total = (bpm * mbs as f64).round().max(0.0) as u64;
    total >> BPER_MB_NORMBITS
}
