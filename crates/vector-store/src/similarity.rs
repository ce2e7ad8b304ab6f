//! Numeric helpers shared by the store and the vectorizer.
//!
//! All functions are total: length mismatches and zero-norm inputs produce a
//! neutral value instead of an error.

#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    dot_f64(a, b) as f32
}

#[must_use]
pub fn magnitude_squared(v: &[f32]) -> f32 {
    norm_squared_f64(v) as f32
}

#[must_use]
pub fn magnitude(v: &[f32]) -> f32 {
    norm_squared_f64(v).sqrt() as f32
}

/// Cosine similarity in `[-1, 1]`.
///
/// Degenerate inputs (different lengths, or a zero vector on either side) score
/// `0.0`, i.e. they are treated as unrelated.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = norm_squared_f64(a).sqrt();
    let norm_b = norm_squared_f64(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_f64(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

/// Euclidean distance; `f32::INFINITY` when the lengths differ.
#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Returns a unit-length copy of `v`, or an unchanged copy if `v` has zero norm.
#[must_use]
pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let norm = norm_squared_f64(v).sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| (f64::from(*x) / norm) as f32).collect()
}

// Sums run in f64 so squares of large or tiny f32 components neither
// overflow nor flush to zero.
fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn norm_squared_f64(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cosine_similarity_basic_cases() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);

        let x = vec![1.0, 0.0];
        let y = vec![0.0, 1.0];
        assert!(cosine_similarity(&x, &y).abs() < 1e-6);

        let neg = vec![-1.0, 0.0];
        assert!((cosine_similarity(&x, &neg) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn euclidean_distance_mismatch_is_infinite() {
        assert!(euclidean_distance(&[1.0], &[1.0, 2.0]).is_infinite());
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn dot_product_and_magnitude() {
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(dot_product(&[1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(magnitude_squared(&[3.0, 4.0]), 25.0);
        assert_eq!(magnitude(&[3.0, 4.0]), 5.0);
    }

    #[test]
    fn normalize_zero_vector_is_unchanged() {
        let zero = vec![0.0, 0.0, 0.0];
        assert_eq!(normalize_vector(&zero), zero);
    }

    #[test]
    fn normalize_does_not_mutate_input() {
        let v = vec![3.0, 4.0];
        let n = normalize_vector(&v);
        assert_eq!(v, vec![3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn extreme_magnitudes_stay_finite() {
        for scale in [1e20_f32, 1e-25, f32::MAX / 2.0] {
            let v = vec![scale, scale];
            assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6, "scale {scale}");
            let n = normalize_vector(&v);
            assert!((magnitude(&n) - 1.0).abs() < 1e-6, "scale {scale}");
            assert!((n[0] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        }
        assert!((magnitude(&[1e20, 0.0]) - 1e20).abs() / 1e20 < 1e-6);
        assert!((euclidean_distance(&[1e-25, 0.0], &[0.0, 0.0]) - 1e-25).abs() < 1e-30);
    }

    fn component() -> impl Strategy<Value = f32> {
        prop_oneof![
            -100.0f32..100.0,
            -1e30f32..1e30,
            -1e-30f32..1e-30,
        ]
    }

    proptest! {
        #[test]
        fn normalized_vectors_have_unit_length(v in prop::collection::vec(component(), 1..32)) {
            prop_assume!(v.iter().any(|x| *x != 0.0));
            let n = normalize_vector(&v);
            prop_assert!((magnitude(&n) - 1.0).abs() < 1e-4);
        }

        #[test]
        fn self_similarity_is_one(v in prop::collection::vec(component(), 1..32)) {
            prop_assume!(v.iter().any(|x| *x != 0.0));
            prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
        }
    }
}
