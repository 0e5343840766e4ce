// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The AV1 rate control engine.

use log::warn;

use super::common::{CodecTuning, EngineCommon};
use super::CodecRateController;
use crate::codec::CodecKind;
use crate::config::RateControlConfig;
use crate::error::EngineError;
use crate::frame::FrameParams;

const DEFAULT_KF_BOOST: i32 = 64;

/// Consecutive buffer-critical frames before forced-maxQ kicks in (§4.J
/// "AV1 extras: forced-maxQ overshoot handling").
const FORCED_MAX_Q_STREAK: u32 = 3;

/// AV1's quantizer matrix strength selector (§4.J "Quant matrices"): aom
/// picks a flatter matrix at low qindex (detail-preserving) and a more
/// aggressive one as qindex rises, in 16 discrete levels, `NUM_QM_LEVELS`
/// being the reference constant. This crate does not encode bitstreams, so
/// it only exposes the level the encoder should request.
const NUM_QM_LEVELS: i32 = 16;

fn quant_matrix_level(qindex: i32, q_range: i32) -> i32 {
    if q_range <= 1 {
        return 0;
    }
    (qindex * (NUM_QM_LEVELS - 1) / (q_range - 1)).clamp(0, NUM_QM_LEVELS - 1)
}

#[derive(Debug)]
pub struct Av1Engine {
    common: EngineCommon,
    consecutive_overshoot_frames: u32,
}

impl Av1Engine {
    pub fn new(bit_depth: crate::BitDepth) -> Self {
        Av1Engine { common: EngineCommon::new(CodecKind::Av1, bit_depth), consecutive_overshoot_frames: 0 }
    }

    fn tuning(&self) -> CodecTuning {
        CodecTuning { default_kf_boost: DEFAULT_KF_BOOST, is_screen_content: false, use_vp8_buffered_target: false }
    }

    /// The quantizer matrix strength level the encoder should use for the
    /// qindex chosen by the last `compute_qp` call.
    pub fn quant_matrix_level(&self) -> i32 {
        let q_range = self.common.codec.limits().q_range;
        quant_matrix_level(self.common.get_qp(), q_range)
    }
}

impl CodecRateController for Av1Engine {
    fn init(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        self.consecutive_overshoot_frames = 0;
        self.common.init(config)
    }

    fn update_config(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        self.common.update_config(config)
    }

    fn compute_qp(&mut self, frame_params: FrameParams) -> Result<(), EngineError> {
        let tuning = self.tuning();
        let idx = crate::svc::layer_idx(&self.common.config, frame_params.spatial_layer_id, frame_params.temporal_layer_id);
        let layer_buffer = self.common.svc.layers[idx].buffer;
        let below_critical = layer_buffer.buffer_level < layer_buffer.optimal_buffer_level / 8;

        self.common.compute_qp(frame_params, tuning)?;

        if below_critical {
            self.consecutive_overshoot_frames += 1;
        } else {
            self.consecutive_overshoot_frames = 0;
        }

        if self.consecutive_overshoot_frames >= FORCED_MAX_Q_STREAK {
            warn!(
                "av1 engine: forcing max-q after {} consecutive buffer-critical frames",
                self.consecutive_overshoot_frames
            );
            let worst = self.common.state.worst_quality;
            self.common.state.base_qindex = worst;
            self.common.state.set_last_q(frame_params.frame_type, worst);
            self.common.svc.save_from(self.common.current_layer_idx, &self.common.state);
        }

        Ok(())
    }

    fn get_qp(&self) -> i32 {
        self.common.get_qp()
    }

    /// AV1 leaves loop filter level selection to the encoder's own
    /// deblocking search rather than deriving it from qindex (§4.J).
    fn get_loop_filter_level(&self) -> i32 {
        0
    }

    fn post_encode_update(&mut self, encoded_frame_size_bytes: u64) -> Result<(), EngineError> {
        self.common.post_encode_update(encoded_frame_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitDepth;

    fn engine() -> Av1Engine {
        let mut e = Av1Engine::new(BitDepth::Depth8);
        let cfg = RateControlConfig::single_layer(1920, 1080, 3000, 30.0);
        e.init(&cfg).unwrap();
        e
    }

    #[test]
    fn quant_matrix_level_is_bounded() {
        let e = engine();
        assert!((0..NUM_QM_LEVELS).contains(&e.quant_matrix_level()));
    }

    #[test]
    fn quant_matrix_level_rises_with_qindex() {
        assert!(quant_matrix_level(0, 256) <= quant_matrix_level(255, 256));
    }

    #[test]
    fn persistent_buffer_underflow_forces_worst_quality() {
        let mut e = engine();
        e.compute_qp(FrameParams::key_frame(0, 0)).unwrap();
        e.post_encode_update(1).unwrap();

        // Starve the buffer with oversized frames so it stays critical.
        for _ in 0..6 {
            e.compute_qp(FrameParams::inter_frame(0, 0)).unwrap();
            e.post_encode_update(50_000_000).unwrap();
        }
        e.compute_qp(FrameParams::inter_frame(0, 0)).unwrap();
        assert_eq!(e.get_qp(), e.common.state.worst_quality);
    }

    #[test]
    fn loop_filter_level_is_always_zero() {
        let e = engine();
        assert_eq!(e.get_loop_filter_level(), 0);
    }
}
