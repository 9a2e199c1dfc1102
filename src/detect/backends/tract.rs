#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::Detector;
use crate::detect::result::{non_max_suppression, BoundingBox, Detection};
use crate::frame::Frame;

const NMS_IOU_THRESHOLD: f32 = 0.45;

/// YOLOv8-style ONNX detector run with tract.
///
/// Expects one `[1, 4 + classes, anchors]` output whose first four rows are
/// box centre and size in model input pixels. Frames are stretched to the
/// model input, so boxes are scaled back per axis.
pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractDetector: loaded {} ({}x{} input)",
            model_path.display(),
            input_width,
            input_height
        );

        Ok(Self {
            model,
            input_width,
            input_height,
            confidence_threshold: 0.5,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized;
        let image = if image.dimensions() == (self.input_width, self.input_height) {
            image
        } else {
            resized = imageops::resize(
                image,
                self.input_width,
                self.input_height,
                FilterType::Triangle,
            );
            &resized
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame_width: u32, frame_height: u32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [batch, rows, anchors]")?;

        let rows = view.shape()[1];
        if rows <= 4 {
            return Err(anyhow!("model output has {} rows, expected 4 + classes", rows));
        }
        let scale_x = frame_width as f32 / self.input_width as f32;
        let scale_y = frame_height as f32 / self.input_height as f32;

        let mut candidates = Vec::new();
        for anchor in 0..view.shape()[2] {
            let best = (4..rows)
                .map(|row| (row - 4, view[[0, row, anchor]]))
                .max_by(|a, b| a.1.total_cmp(&b.1));
            let Some((class, confidence)) = best else {
                continue;
            };
            if confidence < self.confidence_threshold {
                continue;
            }
            let bbox = BoundingBox::from_center(
                view[[0, 0, anchor]] * scale_x,
                view[[0, 1, anchor]] * scale_y,
                view[[0, 2, anchor]] * scale_x,
                view[[0, 3, anchor]] * scale_y,
            );
            candidates.push(Detection {
                class_id: class as u32,
                bbox,
                confidence,
            });
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame.image());
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame.width(), frame.height())
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::new(RgbImage::from_pixel(
            self.input_width,
            self.input_height,
            Rgb([0, 0, 0]),
        ));
        let detections = self.detect(&blank).context("warm-up inference failed")?;
        log::debug!("TractDetector: warm-up produced {} detections", detections.len());
        Ok(())
    }
}
