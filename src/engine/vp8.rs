// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The VP8 rate control engine.

use super::common::{CodecTuning, EngineCommon};
use super::CodecRateController;
use crate::codec::CodecKind;
use crate::config::RateControlConfig;
use crate::error::EngineError;
use crate::frame::FrameParams;

const DEFAULT_KF_BOOST: i32 = 48;

#[derive(Debug)]
pub struct Vp8Engine {
    common: EngineCommon,
}

impl Vp8Engine {
    pub fn new(bit_depth: crate::BitDepth) -> Self {
        Vp8Engine { common: EngineCommon::new(CodecKind::Vp8, bit_depth) }
    }

    fn tuning(&self) -> CodecTuning {
        CodecTuning { default_kf_boost: DEFAULT_KF_BOOST, is_screen_content: false, use_vp8_buffered_target: true }
    }
}

impl CodecRateController for Vp8Engine {
    fn init(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        self.common.init(config)
    }

    fn update_config(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        self.common.update_config(config)
    }

    fn compute_qp(&mut self, frame_params: FrameParams) -> Result<(), EngineError> {
        let tuning = self.tuning();
        self.common.compute_qp(frame_params, tuning)?;
        Ok(())
    }

    fn get_qp(&self) -> i32 {
        self.common.get_qp()
    }

    /// VP8 leaves loop filter level selection to the encoder's own
    /// content-adaptive search rather than deriving it from qindex (§4.J).
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

    fn engine() -> Vp8Engine {
        let mut e = Vp8Engine::new(BitDepth::Depth8);
        let cfg = RateControlConfig::single_layer(640, 480, 500, 30.0);
        e.init(&cfg).unwrap();
        e
    }

    #[test]
    fn loop_filter_level_is_always_zero() {
        let e = engine();
        assert_eq!(e.get_loop_filter_level(), 0);
    }

    #[test]
    fn compute_qp_respects_q_range() {
        let mut e = engine();
        e.compute_qp(FrameParams::key_frame(0, 0)).unwrap();
        assert!((0..=127).contains(&e.get_qp()));
    }

    #[test]
    fn rejects_multi_layer_config() {
        let mut e = Vp8Engine::new(BitDepth::Depth8);
        let mut cfg = RateControlConfig::single_layer(640, 480, 500, 30.0);
        cfg.ss_number_layers = 2;
        assert!(e.init(&cfg).is_err());
    }

    #[test]
    fn steady_state_inter_frames_stay_bounded() {
        let mut e = engine();
        e.compute_qp(FrameParams::key_frame(0, 0)).unwrap();
        e.post_encode_update(30_000).unwrap();
        for _ in 0..30 {
            e.compute_qp(FrameParams::inter_frame(0, 0)).unwrap();
            let q = e.get_qp();
            assert!((0..=127).contains(&q));
            e.post_encode_update(15_000).unwrap();
        }
    }
}
