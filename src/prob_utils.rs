use num::{Float, NumCast};

/// Standardize ln-transformed unnormalized prob distro input
///
/// Returns the index of the most probable component. Ties resolve to the first index.
///
pub fn normalize_ln_distro<F: Float>(x: &mut [F]) -> Option<usize> {
    if x.is_empty() {
        return None;
    }

    let mut max_index = 0;
    let mut max_p = x[0];
    for (index, p) in x.iter().skip(1).enumerate() {
        if *p > max_p {
            max_p = *p;
            max_index = index + 1;
        }
    }

    let mut sum: F = NumCast::from(0).unwrap();
    for p in x.iter_mut() {
        *p = (*p - max_p).exp();
        sum = sum + *p;
    }

    for p in x.iter_mut() {
        *p = *p / sum;
    }

    Some(max_index)
}

/// Sample mean of a slice, or None if it is empty
///
pub fn mean<F: Float>(x: &[F]) -> Option<F> {
    if x.is_empty() {
        return None;
    }
    let sum = x.iter().fold(F::zero(), |acc, &v| acc + v);
    Some(sum / NumCast::from(x.len()).unwrap())
}
