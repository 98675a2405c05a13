//! Vertical speed from altitude over time.

use crate::IgcError;

/// Climb rate at every sample: d(altitude)/d(timestamp).
///
/// Interior points use the second-order central difference for uneven
/// spacing, the two endpoints use one-sided first differences. Timestamps
/// must be strictly increasing and both sequences must hold at least two
/// samples of equal length.
pub fn derive(altitude: &[f64], timestamp: &[f64]) -> Result<Vec<f64>, IgcError> {
    let n = altitude.len();
    if n != timestamp.len() {
        return Err(IgcError::DifferentiationPrecondition(format!(
            "{} altitudes vs {} timestamps",
            n,
            timestamp.len()
        )));
    }
    if n < 2 {
        return Err(IgcError::DifferentiationPrecondition(format!(
            "need at least 2 averaged points, have {}",
            n
        )));
    }
    if let Some(i) = timestamp.windows(2).position(|w| !(w[1] > w[0])) {
        return Err(IgcError::DifferentiationPrecondition(format!(
            "timestamps not strictly increasing at index {} ({} -> {})",
            i + 1,
            timestamp[i],
            timestamp[i + 1]
        )));
    }

    let mut out = Vec::with_capacity(n);
    out.push((altitude[1] - altitude[0]) / (timestamp[1] - timestamp[0]));
    for i in 1..n - 1 {
        let hs = timestamp[i] - timestamp[i - 1];
        let hd = timestamp[i + 1] - timestamp[i];
        let num = hs * hs * altitude[i + 1] + (hd * hd - hs * hs) * altitude[i]
            - hd * hd * altitude[i - 1];
        out.push(num / (hs * hd * (hs + hd)));
    }
    out.push((altitude[n - 1] - altitude[n - 2]) / (timestamp[n - 1] - timestamp[n - 2]));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_linear_climb() {
        let t = [0.0, 60.0, 120.0, 180.0];
        let alt = [100.0, 160.0, 220.0, 280.0];
        assert!(close(&derive(&alt, &t).unwrap(), &[1.0; 4]));
    }

    #[test]
    fn test_uneven_spacing_is_exact_for_quadratics() {
        // altitude = t^2, derivative 2t
        let t = [0.0, 1.0, 3.0, 4.0];
        let alt: Vec<f64> = t.iter().map(|v| v * v).collect();
        let grad = derive(&alt, &t).unwrap();
        assert!(close(&grad[1..3], &[2.0, 6.0]));
        assert!((grad[0] - 1.0).abs() < 1e-9);
        assert!((grad[3] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_points() {
        let grad = derive(&[10.0, 4.0], &[0.0, 2.0]).unwrap();
        assert!(close(&grad, &[-3.0, -3.0]));
    }

    #[test]
    fn test_too_few_points() {
        assert!(matches!(
            derive(&[], &[]),
            Err(IgcError::DifferentiationPrecondition(_))
        ));
        assert!(matches!(
            derive(&[1.0], &[1.0]),
            Err(IgcError::DifferentiationPrecondition(_))
        ));
    }

    #[test]
    fn test_duplicate_timestamps() {
        assert!(matches!(
            derive(&[1.0, 2.0, 3.0], &[0.0, 5.0, 5.0]),
            Err(IgcError::DifferentiationPrecondition(_))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(derive(&[1.0, 2.0], &[0.0, 1.0, 2.0]).is_err());
    }
}
