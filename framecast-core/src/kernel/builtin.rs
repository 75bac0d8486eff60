//! Generators that need no model weights

use super::{Frame, FrameGenerator, PredictRequest};
use crate::error::KernelError;

/// Returns the input frame unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughGenerator;

impl FrameGenerator for PassthroughGenerator {
    fn predict(&self, request: &PredictRequest<'_>) -> Result<Option<Frame>, KernelError> {
        Ok(Some(request.image.clone()))
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Inverts every channel, blended with the input by `strength`
#[derive(Debug, Clone, Copy, Default)]
pub struct InvertGenerator;

impl FrameGenerator for InvertGenerator {
    fn predict(&self, request: &PredictRequest<'_>) -> Result<Option<Frame>, KernelError> {
        let strength = request.params.strength.clamp(0.0, 1.0);
        let mut out = request.image.clone();
        for value in out.data_mut() {
            *value = *value * (1.0 - strength) + (1.0 - *value) * strength;
        }
        Ok(Some(out))
    }

    fn name(&self) -> &str {
        "invert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::GenerationParams;

    fn request<'a>(params: &'a GenerationParams, image: &'a Frame) -> PredictRequest<'a> {
        PredictRequest {
            params,
            width: image.width(),
            height: image.height(),
            image,
        }
    }

    #[test]
    fn passthrough_returns_input() {
        let image = Frame::from_planar(1, 1, vec![0.1, 0.2, 0.3]).unwrap();
        let params = GenerationParams::default();

        let out = PassthroughGenerator.predict(&request(&params, &image)).unwrap();

        assert_eq!(out, Some(image));
    }

    #[test]
    fn invert_at_full_strength_flips_values() {
        let image = Frame::from_planar(1, 1, vec![0.0, 0.25, 1.0]).unwrap();
        let params = GenerationParams {
            strength: 1.0,
            ..GenerationParams::default()
        };

        let out = InvertGenerator
            .predict(&request(&params, &image))
            .unwrap()
            .unwrap();

        assert_eq!(out.data(), &[1.0, 0.75, 0.0]);
    }

    #[test]
    fn invert_at_zero_strength_is_identity() {
        let image = Frame::from_planar(1, 1, vec![0.0, 0.25, 1.0]).unwrap();
        let params = GenerationParams {
            strength: 0.0,
            ..GenerationParams::default()
        };

        let out = InvertGenerator
            .predict(&request(&params, &image))
            .unwrap()
            .unwrap();

        assert_eq!(out, image);
    }
}
