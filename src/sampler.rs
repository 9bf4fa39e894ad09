//! Keyframe sampler data (spec §3.6).

/// How a sampler's keyframes are interpolated between input timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    LinearQuaternion,
    CubicSpline,
    CubicSplineQuaternion,
}

impl Interpolation {
    pub fn is_cubic(self) -> bool {
        matches!(self, Self::CubicSpline | Self::CubicSplineQuaternion)
    }

    pub fn is_quaternion(self) -> bool {
        matches!(self, Self::LinearQuaternion | Self::CubicSplineQuaternion)
    }
}

/// The semantic shape of a sampler's per-keyframe value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Morph-target weights: one scalar per target.
    Array,
    Vec3f,
    Vec4f,
}

/// A fully unpacked keyframe sampler (spec §3.6).
#[derive(Debug, Clone)]
pub struct SamplerData {
    pub interpolation: Interpolation,
    pub component: ComponentKind,
    /// Monotonically increasing keyframe timestamps, in seconds.
    pub input: Vec<f32>,
    /// One inner vector per keyframe, length == component count.
    pub keyframes: Vec<Vec<f32>>,
    /// Only populated for cubic-spline interpolation modes.
    pub tangent_in: Vec<Vec<f32>>,
    pub tangent_out: Vec<Vec<f32>>,
}

impl SamplerData {
    /// Validate spec §3.6's invariants. Called (as a `debug_assert`) by
    /// [`crate::anim::extract`] right after unpacking, so a reshaping bug
    /// like a mis-grouped morph-weight stream fails loudly in debug builds
    /// instead of shipping a mesh with silently misaligned keyframes.
    pub fn validate(&self) -> Result<(), String> {
        if self.keyframes.len() != self.input.len() {
            return Err("keyframes length does not match input length".to_string());
        }
        if self.interpolation.is_cubic() {
            if self.tangent_in.len() != self.input.len() || self.tangent_out.len() != self.input.len() {
                return Err("cubic spline tangent arrays must match input length".to_string());
            }
        }
        if self.interpolation.is_quaternion() && self.component != ComponentKind::Vec4f {
            return Err("quaternion interpolation modes require Vec4f components".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(keyframes: Vec<Vec<f32>>) -> SamplerData {
        SamplerData {
            interpolation: Interpolation::Linear,
            component: ComponentKind::Vec3f,
            input: vec![0.0; keyframes.len()],
            keyframes,
            tangent_in: Vec::new(),
            tangent_out: Vec::new(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_linear_sampler() {
        let data = linear(vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn validate_rejects_keyframe_input_length_mismatch() {
        let mut data = linear(vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        data.input.pop();
        assert!(data.validate().is_err());
    }

    #[test]
    fn validate_rejects_cubic_without_matching_tangents() {
        let mut data = linear(vec![vec![0.0, 0.0, 0.0]]);
        data.interpolation = Interpolation::CubicSpline;
        assert!(data.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_cubic_quaternion_sampler() {
        let data = SamplerData {
            interpolation: Interpolation::CubicSplineQuaternion,
            component: ComponentKind::Vec4f,
            input: vec![0.0, 1.0],
            keyframes: vec![vec![0.0, 0.0, 0.0, 1.0], vec![0.0, 0.0, 0.0, 1.0]],
            tangent_in: vec![vec![0.0; 4], vec![0.0; 4]],
            tangent_out: vec![vec![0.0; 4], vec![0.0; 4]],
        };
        assert!(data.validate().is_ok());
    }

    #[test]
    fn validate_rejects_quaternion_interpolation_on_non_vec4_component() {
        let mut data = linear(vec![vec![0.0, 0.0, 0.0]]);
        data.interpolation = Interpolation::LinearQuaternion;
        assert!(data.validate().is_err());
    }
}
