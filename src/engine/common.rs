// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Shared per-frame control flow (§2): wiring components A-G together the
//! same way for every codec engine. Each codec's `engine` module supplies
//! the handful of values that actually differ (key-frame boost constant,
//! screen-content enumerator, loop filter formula) and calls into here for
//! everything else.

use log::{debug, trace};

use crate::active_q::{self, IntraPathFlags};
use crate::bitdepth::BitDepth;
use crate::codec::CodecKind;
use crate::config::RateControlConfig;
use crate::error::EngineError;
use crate::frame::{FrameParams, FrameType};
use crate::qsearch::{self, CbrAdjustParams, RegulateParams};
use crate::rate_correction::{self, RateFactorLevel};
use crate::state::RateControlState;
use crate::svc::{self, SvcContext};
use crate::target;

/// Codec-specific knobs `EngineCommon::compute_qp` needs but does not own.
#[derive(Copy, Clone, Debug)]
pub struct CodecTuning {
    pub default_kf_boost: i32,
    pub is_screen_content: bool,
    /// VP8 runs its inter-frame target through the buffered-mode variant
    /// (kf/gf overspend recovery, §4.C "VP8 variant") instead of the plain
    /// formula every other codec uses.
    pub use_vp8_buffered_target: bool,
}

/// The state every per-codec engine wraps: a validated config, the shared
/// scratch [`RateControlState`], and the per-layer [`SvcContext`].
#[derive(Clone, Debug)]
pub struct EngineCommon {
    pub codec: CodecKind,
    pub bit_depth: BitDepth,
    pub config: RateControlConfig,
    pub state: RateControlState,
    pub svc: SvcContext,
    pub current_layer_idx: usize,
    pub current_frame_type: FrameType,
    initialized: bool,
}

impl EngineCommon {
    pub fn new(codec: CodecKind, bit_depth: BitDepth) -> Self {
        let limits = codec.limits();
        EngineCommon {
            codec,
            bit_depth,
            config: RateControlConfig::single_layer(0, 0, 0, 30.0),
            state: RateControlState::new(codec, bit_depth, 0, (limits.q_range - 1).max(0)),
            svc: SvcContext { layers: Vec::new() },
            current_layer_idx: 0,
            current_frame_type: FrameType::Inter,
            initialized: false,
        }
    }

    pub fn init(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        config.validate(self.codec)?;
        let q_range = self.codec.limits().q_range;
        let best_quality = crate::qindex::quantizer_to_qindex(config.min_quantizer, q_range);
        let worst_quality = crate::qindex::quantizer_to_qindex(config.max_quantizer, q_range);
        self.config = config.clone();
        self.state = RateControlState::new(self.codec, self.bit_depth, best_quality, worst_quality);
        self.svc = SvcContext::from_config(config, self.codec, best_quality, worst_quality);
        self.initialized = true;
        debug!("{:?} engine initialized: {}x{}, {} layer(s)", self.codec, config.width, config.height, config.num_layers());
        Ok(())
    }

    pub fn update_config(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        config.validate(self.codec)?;
        let q_range = self.codec.limits().q_range;
        let best_quality = crate::qindex::quantizer_to_qindex(config.min_quantizer, q_range);
        let worst_quality = crate::qindex::quantizer_to_qindex(config.max_quantizer, q_range);
        let framerate_only_change = self.config.width == config.width
            && self.config.height == config.height
            && self.config.num_layers() == config.num_layers()
            && self.config.layer_target_bitrate == config.layer_target_bitrate;

        if framerate_only_change && self.initialized {
            self.svc.update_framerate(config);
        } else {
            self.svc = SvcContext::from_config(config, self.codec, best_quality, worst_quality);
        }
        self.config = config.clone();
        self.initialized = true;
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), EngineError> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::InvalidState("compute_qp called before init"))
        }
    }

    /// Components C through F, run in the order laid out in §2's control
    /// flow diagram. Returns the chosen qindex.
    pub fn compute_qp(&mut self, frame_params: FrameParams, tuning: CodecTuning) -> Result<i32, EngineError> {
        self.require_initialized()?;

        let idx = svc::layer_idx(&self.config, frame_params.spatial_layer_id, frame_params.temporal_layer_id);
        self.current_layer_idx = idx;
        self.current_frame_type = frame_params.frame_type;

        self.svc.restore_into(idx, &mut self.state);
        self.state.frame_type = frame_params.frame_type;
        self.state.mbs = crate::Resolution::new(self.config.width, self.config.height).macroblocks();
        self.state.width = self.config.width;
        self.state.height = self.config.height;

        if matches!(frame_params.frame_type, FrameType::Key) {
            self.state.frames_since_key = 0;
            self.svc.reset_spatial_layer_on_keyframe(&self.config, frame_params.spatial_layer_id);
        }

        self.state.buffer.pre_encode_update(self.state.avg_frame_bandwidth);

        let framerate = self.svc.layers[idx].framerate;
        self.state.this_frame_target = if matches!(frame_params.frame_type, FrameType::Key) {
            target::key_frame_target(&self.state, tuning.default_kf_boost, framerate, self.config.max_intra_bitrate_pct)
        } else if tuning.use_vp8_buffered_target {
            target::vp8_pframe_target(
                &mut self.state,
                self.config.undershoot_pct,
                self.config.overshoot_pct,
                self.config.max_inter_bitrate_pct,
            )
        } else {
            target::inter_frame_target(
                self.state.avg_frame_bandwidth,
                self.state.buffer.optimal_buffer_level,
                self.state.buffer.buffer_level,
                self.config.undershoot_pct,
                self.config.overshoot_pct,
                self.config.max_inter_bitrate_pct,
                target::min_frame_bandwidth(self.state.avg_frame_bandwidth),
            )
        };

        let svc_base_last_kf_q = if frame_params.spatial_layer_id > 0 {
            let base_idx = svc::layer_idx(&self.config, 0, frame_params.temporal_layer_id);
            Some(self.svc.layers[base_idx].last_q(FrameType::Key))
        } else {
            None
        };
        let intra_flags = IntraPathFlags {
            first_intra_only_frame: self.state.current_video_frame == 0,
            forced: self.state.this_key_frame_forced,
        };
        let raw_worst = active_q::active_worst_quality(&self.state, svc_base_last_kf_q);
        let raw_best = active_q::active_best_quality(&self.state, intra_flags);
        let (active_best, active_worst) = active_q::clamp_active_range(&self.state, raw_best, raw_worst);
        self.state.active_best_quality = active_best;
        self.state.active_worst_quality = active_worst;

        let level = RateFactorLevel::for_frame(frame_params.frame_type);
        let correction_factor = self.state.rate_correction_factors
            [level.index().min(self.state.rate_correction_factors.len() - 1)];

        let params = RegulateParams {
            codec: self.codec,
            frame_type: frame_params.frame_type,
            bit_depth: self.bit_depth,
            ac_qlookup: &self.state.ac_qlookup,
            correction_factor,
            mbs: self.state.mbs,
            is_screen_content: tuning.is_screen_content,
        };

        let mut q = qsearch::regulate_q(self.state.this_frame_target, active_best, active_worst, &params);
        let cbr_params = CbrAdjustParams {
            frame_type: frame_params.frame_type,
            is_svc: self.config.num_layers() > 1,
            frames_since_key: self.state.frames_since_key,
            q_1_frame: self.state.q_1_frame,
            q_2_frame: self.state.q_2_frame,
            rc_1_frame: self.state.rc_1_frame,
            rc_2_frame: self.state.rc_2_frame,
            avg_frame_bandwidth: self.state.avg_frame_bandwidth,
            prev_avg_frame_bandwidth: self.state.prev_avg_frame_bandwidth,
            width: self.state.width,
            height: self.state.height,
            prev_width: self.state.prev_width,
            prev_height: self.state.prev_height,
            has_prev_frame: self.state.has_prev_frame,
            best_quality: self.state.best_quality,
            worst_quality: self.state.worst_quality,
        };
        q = qsearch::adjust_q_cbr(q, active_worst, &cbr_params);

        self.state.base_qindex = q;
        self.state.set_last_q(frame_params.frame_type, q);
        if matches!(frame_params.frame_type, FrameType::Key) {
            self.state.last_kf_qindex = q;
        }
        self.state.last_boosted_qindex = q;
        self.state.update_avg_frame_qindex(frame_params.frame_type, q);

        self.state.projected_frame_size = crate::qindex::estimate_bits_at_q(
            self.codec,
            frame_params.frame_type,
            q,
            self.state.mbs,
            correction_factor,
            self.bit_depth,
            &self.state.ac_qlookup,
            tuning.is_screen_content,
        ) as i64;

        self.svc.save_from(idx, &self.state);

        trace!(
            "compute_qp: codec={:?} sl={} tl={} type={:?} target={} q={}",
            self.codec, frame_params.spatial_layer_id, frame_params.temporal_layer_id,
            frame_params.frame_type, self.state.this_frame_target, q
        );

        Ok(q)
    }

    pub fn get_qp(&self) -> i32 {
        self.state.base_qindex
    }

    /// Component F + B's post-encode half: correction factor update, then
    /// buffer drain, for whichever layer `compute_qp` last touched.
    ///
    /// `encoded_frame_size_bytes` is the frame's actual encoded size in
    /// bytes, as produced by the encoder proper; every size this crate
    /// tracks internally (targets, buffer levels, bits-per-mb estimates) is
    /// in bits, so the conversion happens right here at the boundary.
    pub fn post_encode_update(&mut self, encoded_frame_size_bytes: u64) -> Result<(), EngineError> {
        self.require_initialized()?;

        self.svc.restore_into(self.current_layer_idx, &mut self.state);

        let encoded_frame_size_bits = encoded_frame_size_bytes as i64 * 8;

        let level = RateFactorLevel::for_frame(self.current_frame_type);
        rate_correction::update_rate_correction_factor(
            &mut self.state.rate_correction_factors,
            &mut self.state.damped_adjustment,
            level,
            self.codec,
            self.state.projected_frame_size,
            encoded_frame_size_bits,
            self.state.base_qindex,
            &mut self.state.q_1_frame,
            &mut self.state.q_2_frame,
            &mut self.state.rc_1_frame,
            &mut self.state.rc_2_frame,
        );

        self.state.buffer.post_encode_update(encoded_frame_size_bits);
        self.state.total_actual_bits += encoded_frame_size_bits;
        self.state.total_target_bits += self.state.this_frame_target;
        self.state.frames_since_key += 1;
        self.state.current_video_frame += 1;

        self.state.prev_avg_frame_bandwidth = self.state.avg_frame_bandwidth;
        self.state.prev_width = self.state.width;
        self.state.prev_height = self.state.height;
        self.state.has_prev_frame = true;

        self.svc.save_from(self.current_layer_idx, &self.state);
        Ok(())
    }
}
