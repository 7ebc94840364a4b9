/// Wraps `value` into `[min, max)` by adding or subtracting the window width.
///
/// A degenerate window (`max <= min`) leaves the value unchanged.
///
/// # Example
///
/// ```rust
/// # use nmrcore::algorithm::fold::fold_shift;
/// assert!((fold_shift(132.0, 100.0, 130.0) - 102.0).abs() < 1e-9);
/// assert!((fold_shift(95.0, 100.0, 130.0) - 125.0).abs() < 1e-9);
/// ```
pub fn fold_shift(value: f64, min: f64, max: f64) -> f64 {
    let delta = max - min;
    if !(delta > 0.0) || !value.is_finite() {
        return value;
    }
    let mut v = value;
    while v < min {
        v += delta;
    }
    while v >= max {
        v -= delta;
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_inside_unchanged() {
        assert_eq!(fold_shift(110.0, 100.0, 130.0), 110.0);
    }

    #[test]
    fn test_fold_multiple_widths() {
        assert!((fold_shift(175.0, 100.0, 130.0) - 115.0).abs() < 1e-9);
        assert!((fold_shift(40.0, 100.0, 130.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_fold_upper_bound_is_open() {
        assert!((fold_shift(130.0, 100.0, 130.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_fold_degenerate_window() {
        assert_eq!(fold_shift(42.0, 10.0, 10.0), 42.0);
    }
}
