//! Xception deepfake classifier on candle.
//!
//! Backbone is the Keras Xception (no top) followed by global average pooling
//! and one sigmoid unit. Weights are safetensors using the `legacy_xception`
//! parameter names (`conv1`, `block1.rep.0.conv1`, `fc`, ...).

use anyhow::{Result, anyhow};
use candle_core::{D, DType, Device, Module, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Linear, VarBuilder};
use std::path::Path;

use super::DeepfakeScorer;
use crate::constants::FACE_INPUT_SIZE;

const IMAGE_SIZE: usize = FACE_INPUT_SIZE as usize;
// Keras BatchNormalization default
const BN_EPS: f64 = 1e-3;

/// Depthwise 3x3 followed by pointwise 1x1, both without bias.
struct SeparableConv {
    depthwise: Conv2d,
    pointwise: Conv2d,
}

impl SeparableConv {
    fn new(in_c: usize, out_c: usize, vb: VarBuilder) -> Result<Self> {
        let depthwise = candle_nn::conv2d_no_bias(
            in_c,
            in_c,
            3,
            Conv2dConfig {
                padding: 1,
                groups: in_c,
                ..Default::default()
            },
            vb.pp("conv1"),
        )?;
        let pointwise =
            candle_nn::conv2d_no_bias(in_c, out_c, 1, Conv2dConfig::default(), vb.pp("pointwise"))?;
        Ok(Self {
            depthwise,
            pointwise,
        })
    }
}

impl Module for SeparableConv {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.apply(&self.depthwise)?.apply(&self.pointwise)
    }
}

enum Layer {
    Relu,
    Sep(SeparableConv),
    Bn(BatchNorm),
    MaxPool(usize),
}

const POOL_KERNEL: usize = 3;

/// Padding `(before, after)` for a "same" window over `len` cells. Odd
/// totals put the extra cell after, as TensorFlow does.
fn same_padding(len: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = len.div_ceil(stride);
    let total = ((out - 1) * stride + kernel).saturating_sub(len);
    (total / 2, total - total / 2)
}

/// 3x3 max pool with "same" padding. Edge replication is equivalent to
/// ignoring the padding for a max.
fn max_pool_same(xs: &Tensor, stride: usize) -> candle_core::Result<Tensor> {
    let (_, _, h, w) = xs.dims4()?;
    let (top, bottom) = same_padding(h, POOL_KERNEL, stride);
    let (left, right) = same_padding(w, POOL_KERNEL, stride);
    xs.pad_with_same(2, top, bottom)?
        .pad_with_same(3, left, right)?
        .max_pool2d_with_stride(POOL_KERNEL, stride)
}

struct BlockArgs {
    in_c: usize,
    out_c: usize,
    reps: usize,
    stride: usize,
    start_with_relu: bool,
    grow_first: bool,
}

struct Block {
    layers: Vec<Layer>,
    skip: Option<(Conv2d, BatchNorm)>,
}

impl Block {
    fn new(args: &BlockArgs, vb: VarBuilder) -> Result<Self> {
        let skip = if args.out_c != args.in_c || args.stride != 1 {
            let conv = candle_nn::conv2d_no_bias(
                args.in_c,
                args.out_c,
                1,
                Conv2dConfig {
                    stride: args.stride,
                    ..Default::default()
                },
                vb.pp("skip"),
            )?;
            let bn = candle_nn::batch_norm(args.out_c, BN_EPS, vb.pp("skipbn"))?;
            Some((conv, bn))
        } else {
            None
        };

        // Channel plan of the separable convs in this block.
        let plan: Vec<(usize, usize)> = (0..args.reps)
            .map(|i| {
                if args.grow_first {
                    (if i == 0 { args.in_c } else { args.out_c }, args.out_c)
                } else {
                    (
                        args.in_c,
                        if i + 1 < args.reps { args.in_c } else { args.out_c },
                    )
                }
            })
            .collect();

        // Layer indices follow the sequential container: [relu,] sep, bn, relu, sep, bn, ...
        let rep = vb.pp("rep");
        let mut layers = Vec::new();
        let mut idx = 0;
        for (i, (in_c, out_c)) in plan.into_iter().enumerate() {
            if i > 0 || args.start_with_relu {
                layers.push(Layer::Relu);
                idx += 1;
            }
            layers.push(Layer::Sep(SeparableConv::new(in_c, out_c, rep.pp(idx))?));
            idx += 1;
            layers.push(Layer::Bn(candle_nn::batch_norm(out_c, BN_EPS, rep.pp(idx))?));
            idx += 1;
        }
        if args.stride != 1 {
            layers.push(Layer::MaxPool(args.stride));
        }

        Ok(Self { layers, skip })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut out = xs.clone();
        for layer in &self.layers {
            out = match layer {
                Layer::Relu => out.relu()?,
                Layer::Sep(conv) => out.apply(conv)?,
                Layer::Bn(bn) => out.apply_t(bn, false)?,
                Layer::MaxPool(stride) => max_pool_same(&out, *stride)?,
            };
        }
        let residual = match &self.skip {
            Some((conv, bn)) => xs.apply(conv)?.apply_t(bn, false)?,
            None => xs.clone(),
        };
        out + residual
    }
}

fn block_args() -> Vec<BlockArgs> {
    let block = |in_c, out_c, reps, stride, start_with_relu, grow_first| BlockArgs {
        in_c,
        out_c,
        reps,
        stride,
        start_with_relu,
        grow_first,
    };

    let mut args = vec![
        block(64, 128, 2, 2, false, true),
        block(128, 256, 2, 2, true, true),
        block(256, 728, 2, 2, true, true),
    ];
    args.extend((0..8).map(|_| block(728, 728, 3, 1, true, true)));
    args.push(block(728, 1024, 2, 2, true, false));
    args
}

struct Xception {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    blocks: Vec<Block>,
    conv3: SeparableConv,
    bn3: BatchNorm,
    conv4: SeparableConv,
    bn4: BatchNorm,
    fc: Linear,
}

impl Xception {
    fn new(vb: VarBuilder) -> Result<Self> {
        let conv1 = candle_nn::conv2d_no_bias(
            3,
            32,
            3,
            Conv2dConfig {
                stride: 2,
                ..Default::default()
            },
            vb.pp("conv1"),
        )?;
        let conv2 =
            candle_nn::conv2d_no_bias(32, 64, 3, Conv2dConfig::default(), vb.pp("conv2"))?;

        let blocks = block_args()
            .iter()
            .enumerate()
            .map(|(i, args)| Block::new(args, vb.pp(format!("block{}", i + 1))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            conv1,
            bn1: candle_nn::batch_norm(32, BN_EPS, vb.pp("bn1"))?,
            conv2,
            bn2: candle_nn::batch_norm(64, BN_EPS, vb.pp("bn2"))?,
            blocks,
            conv3: SeparableConv::new(1024, 1536, vb.pp("conv3"))?,
            bn3: candle_nn::batch_norm(1536, BN_EPS, vb.pp("bn3"))?,
            conv4: SeparableConv::new(1536, 2048, vb.pp("conv4"))?,
            bn4: candle_nn::batch_norm(2048, BN_EPS, vb.pp("bn4"))?,
            fc: candle_nn::linear(2048, 1, vb.pp("fc"))?,
        })
    }

    /// `(batch, 3, 299, 299)` in `[-1, 1]` to `(batch,)` fake probabilities.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = xs
            .apply(&self.conv1)?
            .apply_t(&self.bn1, false)?
            .relu()?
            .apply(&self.conv2)?
            .apply_t(&self.bn2, false)?
            .relu()?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        let features = xs
            .apply(&self.conv3)?
            .apply_t(&self.bn3, false)?
            .relu()?
            .apply(&self.conv4)?
            .apply_t(&self.bn4, false)?
            .relu()?
            .mean((2, 3))?;
        let logits = features.apply(&self.fc)?.squeeze(D::Minus1)?;
        candle_nn::ops::sigmoid(&logits)
    }
}

/// [`DeepfakeScorer`] running the Xception classifier.
pub struct XceptionScorer {
    model: Xception,
    device: Device,
}

impl XceptionScorer {
    pub fn load(weights: &Path) -> Result<Self> {
        #[cfg(feature = "metal")]
        let device = Device::new_metal(0).unwrap_or(Device::Cpu);
        #[cfg(not(feature = "metal"))]
        let device = Device::Cpu;

        log::info!(
            "Loading deepfake model {} on {:?}",
            weights.display(),
            device
        );
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = Xception::new(vb)?;
        log::info!("Deepfake model loaded");

        Ok(Self { model, device })
    }

    fn preprocess_batch(&self, crops: &[Vec<u8>]) -> Result<Tensor> {
        let data = to_chw(crops)?;
        Ok(Tensor::from_vec(
            data,
            (crops.len(), 3, IMAGE_SIZE, IMAGE_SIZE),
            &self.device,
        )?)
    }
}

impl DeepfakeScorer for XceptionScorer {
    fn score(&self, crops: &[Vec<u8>]) -> Result<Vec<f32>> {
        if crops.is_empty() {
            return Ok(vec![]);
        }
        let input = self.preprocess_batch(crops)?;
        let probs = self.model.forward(&input)?;
        Ok(probs.to_vec1()?)
    }
}

/// Interleaved RGB crops to a planar CHW batch scaled to `[-1, 1]`.
fn to_chw(crops: &[Vec<u8>]) -> Result<Vec<f32>> {
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut data = vec![0f32; crops.len() * 3 * plane];

    for (batch_idx, rgb) in crops.iter().enumerate() {
        if rgb.len() != plane * 3 {
            return Err(anyhow!(
                "Face {} expected {}x{}x3 RGB, got {} bytes",
                batch_idx,
                IMAGE_SIZE,
                IMAGE_SIZE,
                rgb.len()
            ));
        }
        let offset = batch_idx * 3 * plane;
        for i in 0..plane {
            for c in 0..3 {
                data[offset + c * plane + i] = rgb[i * 3 + c] as f32 / 127.5 - 1.0;
            }
        }
    }
    Ok(data)
}
