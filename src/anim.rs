//! Animation extractor (C5, spec §4.5).
//!
//! Pulls a single sampler's keyframe data out of a parsed glTF document. Has
//! no state of its own -- everything here is a pure function of the
//! document plus the accompanying buffer data, called by
//! [`crate::loader::gltf::GltfLoader::sampler_data`].

use gltf::animation::util::ReadOutputs;
use gltf::animation::{Channel, Interpolation as GltfInterpolation};
use gltf::buffer;
use gltf::Document;

pub use crate::sampler::{ComponentKind, Interpolation, SamplerData};

/// Find the channel in `animation_index` that drives `sampler_index`, then
/// unpack its sampler into a [`SamplerData`]. Returns `None` for an
/// out-of-range animation or a sampler no channel references (spec §4.5
/// "Missing animation index or missing sampler index: return null").
pub fn extract(
    document: &Document,
    buffers: &[buffer::Data],
    animation_index: usize,
    sampler_index: usize,
) -> Option<SamplerData> {
    let animation = document.animations().nth(animation_index)?;
    let channel = animation
        .channels()
        .find(|c| c.sampler().index() == sampler_index)?;
    Some(unpack(buffers, &channel))
}

fn unpack(buffers: &[buffer::Data], channel: &Channel) -> SamplerData {
    let sampler = channel.sampler();
    let reader = channel.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
    let gltf_interp = sampler.interpolation();
    let cubic = gltf_interp == GltfInterpolation::CubicSpline;

    let input: Vec<f32> = reader
        .read_inputs()
        .map(|iter| iter.collect())
        .unwrap_or_default();

    let (component, flat): (ComponentKind, Vec<Vec<f32>>) = match reader.read_outputs() {
        Some(ReadOutputs::Translations(iter)) => {
            (ComponentKind::Vec3f, iter.map(|v| v.to_vec()).collect())
        }
        Some(ReadOutputs::Scales(iter)) => (ComponentKind::Vec3f, iter.map(|v| v.to_vec()).collect()),
        Some(ReadOutputs::Rotations(rot)) => (
            ComponentKind::Vec4f,
            rot.into_f32().map(|v| v.to_vec()).collect(),
        ),
        Some(ReadOutputs::MorphTargetWeights(weights)) => {
            let raw: Vec<f32> = weights.into_f32().collect();
            (ComponentKind::Array, group_morph_weights(raw, input.len(), cubic))
        }
        None => (ComponentKind::Vec3f, Vec::new()),
    };

    let is_quaternion = component == ComponentKind::Vec4f;
    let interpolation = map_interpolation(gltf_interp, is_quaternion);

    let result = if interpolation.is_cubic() {
        // glTF lays cubic-spline output out as `a_1..a_k v_1..v_k b_1..b_k`
        // per keyframe (spec §4.3.1, §4.5 step 5): split the flat triple
        // into parallel tangent-in/value/tangent-out arrays.
        let mut tangent_in = Vec::with_capacity(input.len());
        let mut keyframes = Vec::with_capacity(input.len());
        let mut tangent_out = Vec::with_capacity(input.len());
        for chunk in flat.chunks_exact(3) {
            tangent_in.push(chunk[0].clone());
            keyframes.push(chunk[1].clone());
            tangent_out.push(chunk[2].clone());
        }
        SamplerData {
            interpolation,
            component,
            input,
            keyframes,
            tangent_in,
            tangent_out,
        }
    } else {
        SamplerData {
            interpolation,
            component,
            input,
            keyframes: flat,
            tangent_in: Vec::new(),
            tangent_out: Vec::new(),
        }
    };

    debug_assert!(
        result.validate().is_ok(),
        "unpacked sampler violates its own invariants: {:?}",
        result.validate().err()
    );
    result
}

/// Reshape a flat `numKeyframes * numTargets` (or, for cubic-spline,
/// `numKeyframes * 3 * numTargets`) stream of morph-target weights into one
/// vector per keyframe group, each `numTargets` long (spec §4.5 steps 3/5).
/// `gltf`'s `ReadOutputs::MorphTargetWeights` can't know `numTargets` itself, so
/// it hands back a flat scalar stream; this is the one place that reshapes
/// it, using `input.len()` (and the cubic-spline 3x multiplier) to recover
/// the grouping.
fn group_morph_weights(raw: Vec<f32>, num_keyframes: usize, cubic: bool) -> Vec<Vec<f32>> {
    let groups = if cubic { num_keyframes * 3 } else { num_keyframes };
    if groups == 0 {
        assert!(
            raw.is_empty(),
            "morph-target weight sampler has {} output values but no input keyframes",
            raw.len()
        );
        return Vec::new();
    }
    assert_eq!(
        raw.len() % groups,
        0,
        "morph-target weight sampler output length {} is not evenly divisible by {groups} keyframe groups",
        raw.len()
    );
    let num_targets = raw.len() / groups;
    raw.chunks_exact(num_targets).map(<[f32]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_morph_weights_reshapes_linear_stream_by_target_count() {
        // 3 keyframes, 2 morph targets each.
        let raw = vec![0.0, 1.0, 0.2, 0.8, 0.4, 0.6];
        let grouped = group_morph_weights(raw, 3, false);
        assert_eq!(grouped, vec![vec![0.0, 1.0], vec![0.2, 0.8], vec![0.4, 0.6]]);
    }

    #[test]
    fn group_morph_weights_reshapes_cubic_stream_by_target_count() {
        // 2 keyframes, 2 targets, 3 groups (tangent-in/value/tangent-out) per keyframe.
        let raw: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let grouped = group_morph_weights(raw, 2, true);
        assert_eq!(grouped.len(), 6);
        assert_eq!(grouped[0], vec![0.0, 1.0]);
        assert_eq!(grouped[5], vec![10.0, 11.0]);
    }

    #[test]
    fn group_morph_weights_handles_no_keyframes() {
        assert_eq!(group_morph_weights(Vec::new(), 0, false), Vec::<Vec<f32>>::new());
    }

    #[test]
    #[should_panic(expected = "not evenly divisible")]
    fn group_morph_weights_panics_on_indivisible_length() {
        group_morph_weights(vec![0.0, 1.0, 2.0], 2, false);
    }
}

/// `LINEAR`/`CUBICSPLINE` split into their quaternion variants when the
/// output is Vec4 (rotation); `STEP` never splits. Unknown interpolation
/// strings can't actually reach here -- the `gltf` crate's own enum has no
/// "unknown" variant, it rejects the document at parse time instead -- so
/// the spec's "unknown string defaults to Linear, logs a warning" fallback
/// is unreachable in this implementation and kept only as a documented
/// decision (see `DESIGN.md`).
fn map_interpolation(interp: GltfInterpolation, is_quaternion: bool) -> Interpolation {
    match (interp, is_quaternion) {
        (GltfInterpolation::Step, _) => Interpolation::Step,
        (GltfInterpolation::Linear, true) => Interpolation::LinearQuaternion,
        (GltfInterpolation::Linear, false) => Interpolation::Linear,
        (GltfInterpolation::CubicSpline, true) => Interpolation::CubicSplineQuaternion,
        (GltfInterpolation::CubicSpline, false) => Interpolation::CubicSpline,
    }
}
