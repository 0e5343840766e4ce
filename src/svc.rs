// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component G: per-(spatial, temporal) layer state for scalable video
//! coding. A [`RateControlState`] is shared scratch space; each layer keeps
//! its own slice of the fields that must persist across frames that belong
//! to *other* layers, and [`SvcContext::restore_into`] /
//! [`SvcContext::save_from`] swap that slice into and out of the shared
//! state around each frame.

use log::debug;

use crate::buffer::BufferModel;
use crate::codec::CodecKind;
use crate::config::RateControlConfig;
use crate::frame::FrameType;
use crate::state::RateControlState;

/// `sl * ts_number_layers + tl`, the same indexing [`RateControlConfig`]
/// uses for its per-layer vectors.
pub fn layer_idx(cfg: &RateControlConfig, spatial_layer_id: u8, temporal_layer_id: u8) -> usize {
    cfg.layer_index(spatial_layer_id, temporal_layer_id)
}

/// The subset of [`RateControlState`] that must be tracked independently
/// per layer rather than shared across the whole stream.
#[derive(Clone, Debug)]
pub struct LayerContext {
    pub target_bandwidth_bps: i64,
    pub avg_frame_bandwidth: i64,
    pub min_frame_bandwidth: i64,
    pub max_frame_bandwidth: i64,
    pub last_avg_frame_bandwidth: i64,

    pub buffer: BufferModel,

    pub rate_correction_factors: Vec<f64>,
    pub damped_adjustment: Vec<bool>,

    last_q: [i32; 2],
    avg_frame_qindex: [i32; 2],
    pub last_boosted_qindex: i32,
    pub last_kf_qindex: i32,
    pub q_1_frame: i32,
    pub q_2_frame: i32,
    pub rc_1_frame: i32,
    pub rc_2_frame: i32,

    pub best_quality: i32,
    pub worst_quality: i32,
    pub active_best_quality: i32,
    pub active_worst_quality: i32,

    pub frames_since_key: u64,
    pub frames_to_key: u64,

    /// This layer's effective framerate: the stream framerate divided by
    /// its `ts_rate_decimator` entry.
    pub framerate: f64,
}

impl LayerContext {
    fn new(codec: CodecKind, best_quality: i32, worst_quality: i32) -> Self {
        LayerContext {
            target_bandwidth_bps: 0,
            avg_frame_bandwidth: 0,
            min_frame_bandwidth: 0,
            max_frame_bandwidth: 0,
            last_avg_frame_bandwidth: 0,
            buffer: BufferModel::default(),
            rate_correction_factors: vec![1.0; codec.rate_factor_levels().max(1)],
            damped_adjustment: vec![false; codec.rate_factor_levels().max(1)],
            last_q: [best_quality, best_quality],
            avg_frame_qindex: [best_quality, best_quality],
            last_boosted_qindex: best_quality,
            last_kf_qindex: best_quality,
            q_1_frame: best_quality,
            q_2_frame: best_quality,
            rc_1_frame: 0,
            rc_2_frame: 0,
            best_quality,
            worst_quality,
            active_best_quality: best_quality,
            active_worst_quality: worst_quality,
            frames_since_key: 0,
            frames_to_key: 0,
            framerate: 30.0,
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
}

fn frame_type_index(frame_type: FrameType) -> usize {
    match frame_type {
        FrameType::Key => 0,
        FrameType::Inter => 1,
    }
}

/// All layer contexts for one engine, plus the bookkeeping to move a
/// layer's state into and out of the engine's shared [`RateControlState`].
#[derive(Clone, Debug)]
pub struct SvcContext {
    pub layers: Vec<LayerContext>,
}

impl SvcContext {
    /// Builds one context per `(spatial, temporal)` layer from `cfg`
    /// (engine `init`/`update_config`, §4.G "Resizing on config change").
    /// Existing layer bandwidth history is not preserved across a resize —
    /// a changed layer topology invalidates any running average anyway.
    pub fn from_config(cfg: &RateControlConfig, codec: CodecKind, best_quality: i32, worst_quality: i32) -> Self {
        let mut layers = Vec::with_capacity(cfg.num_layers());
        for sl in 0..cfg.ss_number_layers {
            for tl in 0..cfg.ts_number_layers {
                let idx = layer_idx(cfg, sl, tl);
                let mut layer = LayerContext::new(codec, best_quality, worst_quality);

                let bitrate_kbps = *cfg.layer_target_bitrate.get(idx).unwrap_or(&cfg.target_bandwidth);
                layer.target_bandwidth_bps = bitrate_kbps * 1000;

                let decimator = *cfg.ts_rate_decimator.get(tl as usize).unwrap_or(&1);
                layer.framerate = cfg.effective_framerate() / decimator.max(1) as f64;

                let frame_period_us = 1_000_000.0 / layer.framerate.max(1e-6);
                layer.avg_frame_bandwidth =
                    (layer.target_bandwidth_bps as f64 * frame_period_us / 1_000_000.0) as i64;
                layer.max_frame_bandwidth = layer.target_bandwidth_bps;
                layer.min_frame_bandwidth = crate::target::min_frame_bandwidth(layer.avg_frame_bandwidth);

                layer.buffer = BufferModel::from_config(cfg, layer.target_bandwidth_bps);

                let q_range = codec.limits().q_range;
                let min_q = *cfg.min_quantizers.get(idx).unwrap_or(&cfg.min_quantizer);
                let max_q = *cfg.max_quantizers.get(idx).unwrap_or(&cfg.max_quantizer);
                layer.best_quality = crate::qindex::quantizer_to_qindex(min_q, q_range);
                layer.worst_quality = crate::qindex::quantizer_to_qindex(max_q, q_range);
                layer.active_best_quality = layer.best_quality;
                layer.active_worst_quality = layer.worst_quality;

                layers.push(layer);
            }
        }
        debug!("svc context rebuilt: {} layer(s)", layers.len());
        SvcContext { layers }
    }

    /// Recomputes each layer's effective framerate and derived bandwidth
    /// fields after a stream framerate change (§4.G "Temporal-layer
    /// framerate update"), without discarding buffer or Q history.
    pub fn update_framerate(&mut self, cfg: &RateControlConfig) {
        for sl in 0..cfg.ss_number_layers {
            for tl in 0..cfg.ts_number_layers {
                let idx = layer_idx(cfg, sl, tl);
                let layer = &mut self.layers[idx];
                let decimator = *cfg.ts_rate_decimator.get(tl as usize).unwrap_or(&1);
                layer.framerate = cfg.effective_framerate() / decimator.max(1) as f64;
                let frame_period_us = 1_000_000.0 / layer.framerate.max(1e-6);
                layer.avg_frame_bandwidth =
                    (layer.target_bandwidth_bps as f64 * frame_period_us / 1_000_000.0) as i64;
                layer.min_frame_bandwidth = crate::target::min_frame_bandwidth(layer.avg_frame_bandwidth);
            }
        }
    }

    /// Swaps layer `idx`'s persisted fields into `state` ahead of encoding
    /// its next frame (§4.G "Per-frame restore").
    pub fn restore_into(&self, idx: usize, state: &mut RateControlState) {
        let layer = &self.layers[idx];
        state.avg_frame_bandwidth = layer.avg_frame_bandwidth;
        state.min_frame_bandwidth = layer.min_frame_bandwidth;
        state.max_frame_bandwidth = layer.max_frame_bandwidth;
        state.last_avg_frame_bandwidth = layer.last_avg_frame_bandwidth;
        state.buffer = layer.buffer;
        state.rate_correction_factors = layer.rate_correction_factors.clone();
        state.damped_adjustment = layer.damped_adjustment.clone();
        state.set_last_q(FrameType::Key, layer.last_q(FrameType::Key));
        state.set_last_q(FrameType::Inter, layer.last_q(FrameType::Inter));
        state.set_avg_frame_qindex(FrameType::Key, layer.avg_frame_qindex(FrameType::Key));
        state.set_avg_frame_qindex(FrameType::Inter, layer.avg_frame_qindex(FrameType::Inter));
        state.last_boosted_qindex = layer.last_boosted_qindex;
        state.last_kf_qindex = layer.last_kf_qindex;
        state.q_1_frame = layer.q_1_frame;
        state.q_2_frame = layer.q_2_frame;
        state.rc_1_frame = layer.rc_1_frame;
        state.rc_2_frame = layer.rc_2_frame;
        state.best_quality = layer.best_quality;
        state.worst_quality = layer.worst_quality;
        state.active_best_quality = layer.active_best_quality;
        state.active_worst_quality = layer.active_worst_quality;
        state.frames_since_key = layer.frames_since_key;
        state.frames_to_key = layer.frames_to_key;
    }

    /// Writes `state`'s persisted fields back into layer `idx` after
    /// encoding (§4.G "Per-frame save").
    pub fn save_from(&mut self, idx: usize, state: &RateControlState) {
        let layer = &mut self.layers[idx];
        layer.avg_frame_bandwidth = state.avg_frame_bandwidth;
        layer.min_frame_bandwidth = state.min_frame_bandwidth;
        layer.max_frame_bandwidth = state.max_frame_bandwidth;
        layer.last_avg_frame_bandwidth = state.last_avg_frame_bandwidth;
        layer.buffer = state.buffer;
        layer.rate_correction_factors = state.rate_correction_factors.clone();
        layer.damped_adjustment = state.damped_adjustment.clone();
        layer.set_last_q(FrameType::Key, state.last_q(FrameType::Key));
        layer.set_last_q(FrameType::Inter, state.last_q(FrameType::Inter));
        layer.set_avg_frame_qindex(FrameType::Key, state.avg_frame_qindex(FrameType::Key));
        layer.set_avg_frame_qindex(FrameType::Inter, state.avg_frame_qindex(FrameType::Inter));
        layer.last_boosted_qindex = state.last_boosted_qindex;
        layer.last_kf_qindex = state.last_kf_qindex;
        layer.q_1_frame = state.q_1_frame;
        layer.q_2_frame = state.q_2_frame;
        layer.rc_1_frame = state.rc_1_frame;
        layer.rc_2_frame = state.rc_2_frame;
        layer.best_quality = state.best_quality;
        layer.worst_quality = state.worst_quality;
        layer.active_best_quality = state.active_best_quality;
        layer.active_worst_quality = state.active_worst_quality;
        layer.frames_since_key = state.frames_since_key;
        layer.frames_to_key = state.frames_to_key;
    }

    /// Resets every temporal layer of spatial layer `sl` for a key frame
    /// (§4.G "Key-frame reset"): a key frame is a synchronization point
    /// across all temporal layers of that spatial layer.
    pub fn reset_spatial_layer_on_keyframe(&mut self, cfg: &RateControlConfig, sl: u8) {
        for tl in 0..cfg.ts_number_layers {
            let idx = layer_idx(cfg, sl, tl);
            let layer = &mut self.layers[idx];
            layer.frames_since_key = 0;
            layer.frames_to_key = 0;
        }
    }

    /// Whether spatial layer `sl` is at a "layer sync" frame — its base
    /// temporal layer (`tl == 0`) just produced a key frame and the
    /// remaining temporal layers of the same spatial layer should
    /// re-derive their quality bounds from it rather than drift
    /// independently (§4.G "Layer sync").
    pub fn layer_sync_quality(&self, cfg: &RateControlConfig, sl: u8) -> (i32, i32) {
        let base = &self.layers[layer_idx(cfg, sl, 0)];
        (base.active_best_quality, base.active_worst_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc_config() -> RateControlConfig {
        let mut cfg = RateControlConfig::single_layer(1280, 720, 2000, 30.0);
        cfg.ss_number_layers = 2;
        cfg.ts_number_layers = 2;
        cfg.max_quantizers = vec![63; 4];
        cfg.min_quantizers = vec![0; 4];
        cfg.scaling_factor_num = vec![1, 2];
        cfg.scaling_factor_den = vec![2, 2];
        cfg.layer_target_bitrate = vec![250, 500, 1000, 2000];
        cfg.ts_rate_decimator = vec![2, 1];
        cfg
    }

    #[test]
    fn builds_one_context_per_layer() {
        let ctx = SvcContext::from_config(&svc_config(), CodecKind::Vp9, 0, 63);
        assert_eq!(ctx.layers.len(), 4);
    }

    #[test]
    fn temporal_layer_framerate_is_decimated() {
        let cfg = svc_config();
        let ctx = SvcContext::from_config(&cfg, CodecKind::Vp9, 0, 63);
        let base_tl = &ctx.layers[layer_idx(&cfg, 0, 0)];
        let top_tl = &ctx.layers[layer_idx(&cfg, 0, 1)];
        assert_eq!(base_tl.framerate, 15.0);
        assert_eq!(top_tl.framerate, 30.0);
    }

    #[test]
    fn restore_then_save_round_trips_through_shared_state() {
        let cfg = svc_config();
        let mut ctx = SvcContext::from_config(&cfg, CodecKind::Vp9, 0, 63);
        let idx = layer_idx(&cfg, 1, 0);
        ctx.layers[idx].active_worst_quality = 40;

        let mut state = RateControlState::new(CodecKind::Vp9, crate::bitdepth::BitDepth::Depth8, 0, 63);
        ctx.restore_into(idx, &mut state);
        assert_eq!(state.active_worst_quality, 40);

        state.active_worst_quality = 20;
        ctx.save_from(idx, &state);
        assert_eq!(ctx.layers[idx].active_worst_quality, 20);
    }

    #[test]
    fn keyframe_reset_clears_all_temporal_layers_of_a_spatial_layer() {
        let cfg = svc_config();
        let mut ctx = SvcContext::from_config(&cfg, CodecKind::Vp9, 0, 63);
        for tl in 0..cfg.ts_number_layers {
            ctx.layers[layer_idx(&cfg, 0, tl)].frames_since_key = 50;
        }
        ctx.reset_spatial_layer_on_keyframe(&cfg, 0);
        for tl in 0..cfg.ts_number_layers {
            assert_eq!(ctx.layers[layer_idx(&cfg, 0, tl)].frames_since_key, 0);
        }
    }
}
