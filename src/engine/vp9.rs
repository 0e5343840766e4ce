// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The VP9 rate control engine.

use super::common::{CodecTuning, EngineCommon};
use super::CodecRateController;
use crate::codec::{CodecKind, MAX_LOOP_FILTER};
use crate::config::RateControlConfig;
use crate::error::EngineError;
use crate::frame::FrameParams;

/// VP9's baseline key-frame boost constant, the same order of magnitude
/// libvpx's `vp9_rc_get_default_min_gf_interval`-adjacent code uses.
const DEFAULT_KF_BOOST: i32 = 64;

#[derive(Debug)]
pub struct Vp9Engine {
    common: EngineCommon,
}

impl Vp9Engine {
    pub fn new(bit_depth: crate::BitDepth) -> Self {
        Vp9Engine { common: EngineCommon::new(CodecKind::Vp9, bit_depth) }
    }

    fn tuning(&self) -> CodecTuning {
        CodecTuning { default_kf_boost: DEFAULT_KF_BOOST, is_screen_content: false, use_vp8_buffered_target: false }
    }

    /// `ROUND_POWER_OF_TWO(q * 20723 + 1015158, 18)`, clamped to
    /// `[0, MAX_LOOP_FILTER]` (§4.J).
    fn loop_filter_level_for_q(q: i32) -> i32 {
        const SHIFT: u32 = 18;
        let value: i64 = q as i64 * 20723 + 1_015_158;
        let rounded = (value + (1 << (SHIFT - 1))) >> SHIFT;
        (rounded as i32).clamp(0, MAX_LOOP_FILTER)
    }
}

impl CodecRateController for Vp9Engine {
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

    fn get_loop_filter_level(&self) -> i32 {
        Self::loop_filter_level_for_q(self.common.get_qp())
    }

    fn post_encode_update(&mut self, encoded_frame_size_bytes: u64) -> Result<(), EngineError> {
        self.common.post_encode_update(encoded_frame_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitDepth;

    fn engine() -> Vp9Engine {
        let mut e = Vp9Engine::new(BitDepth::Depth8);
        let cfg = RateControlConfig::single_layer(1280, 720, 2000, 30.0);
        e.init(&cfg).unwrap();
        e
    }

    #[test]
    fn compute_qp_then_get_qp_is_within_range() {
        let mut e = engine();
        e.compute_qp(FrameParams::key_frame(0, 0)).unwrap();
        let q = e.get_qp();
        assert!((0..=255).contains(&q));
    }

    #[test]
    fn loop_filter_level_is_bounded() {
        for q in [0, 60, 120, 255] {
            let level = Vp9Engine::loop_filter_level_for_q(q);
            assert!((0..=MAX_LOOP_FILTER).contains(&level));
        }
    }

    #[test]
    fn loop_filter_level_increases_with_q() {
        assert!(Vp9Engine::loop_filter_level_for_q(20) <= Vp9Engine::loop_filter_level_for_q(200));
    }

    #[test]
    fn post_encode_update_drains_buffer() {
        let mut e = engine();
        e.compute_qp(FrameParams::inter_frame(0, 0)).unwrap();
        let before = e.common.state.buffer.buffer_level;
        e.post_encode_update(50_000).unwrap();
        assert_ne!(e.common.state.buffer.buffer_level, before);
    }

    #[test]
    fn compute_qp_before_init_is_rejected() {
        let mut e = Vp9Engine::new(BitDepth::Depth8);
        assert!(e.compute_qp(FrameParams::key_frame(0, 0)).is_err());
    }
}
