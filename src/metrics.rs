//! Evaluation metrics.
//!
//! Metrics never take part in backprop; trainers call them between epochs.

/// Fraction of `predicted` labels equal to the index-aligned `expected` label.
///
/// Returns `0.0` for empty inputs.
pub fn accuracy(predicted: &[usize], expected: &[usize]) -> f32 {
    assert_eq!(
        predicted.len(),
        expected.len(),
        "predicted len {} does not match expected len {}",
        predicted.len(),
        expected.len()
    );
    if predicted.is_empty() {
        return 0.0;
    }

    let correct = predicted
        .iter()
        .zip(expected)
        .filter(|(p, e)| p == e)
        .count();
    correct as f32 / predicted.len() as f32
}
