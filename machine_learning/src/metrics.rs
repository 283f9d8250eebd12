use ndarray::{ArrayView1, ArrayView2, Zip};

/// Returns the index of the greatest value in `row`, the first one on ties.
///
/// An empty row yields 0. `NaN`s never win a comparison.
pub fn argmax(row: ArrayView1<f32>) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;

    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }

    best
}

/// Counts the rows where the predicted class matches the one-hot target class.
pub fn categorical_hits(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> usize {
    let mut hits = 0;

    Zip::from(y_pred.rows()).and(y.rows()).for_each(|p, t| {
        if argmax(p) == argmax(t) {
            hits += 1;
        }
    });

    hits
}
