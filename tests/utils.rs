#![allow(dead_code)]
use calcex::Value;

fn is_close(actual: f64, expected: f64, atol: f64, rtol: f64) -> bool {
    (actual - expected).abs() < atol + rtol * expected.abs()
}

pub fn assert_float_eq_f64(actual: f64, expected: f64) {
    assert!(
        is_close(actual, expected, 1e-12, 0.0),
        "{} is not close to {}",
        actual,
        expected
    );
}

/// Compares doubles with a relative tolerance for results of large magnitude.
pub fn assert_float_eq_rel(actual: f64, expected: f64) {
    assert!(
        is_close(actual, expected, 1e-12, 1e-12),
        "{} is not close to {}",
        actual,
        expected
    );
}

/// Flattens nested vectors and matrices and compares each scalar to `expected`.
pub fn assert_values_close(actual: &Value, expected: &[f64]) {
    fn flatten(v: &Value, out: &mut Vec<f64>) {
        match v {
            Value::Vector(elts) => elts.iter().for_each(|e| flatten(e, out)),
            Value::Matrix(rows) => rows.iter().flatten().for_each(|e| flatten(e, out)),
            _ => out.push(v.to_number().unwrap()),
        }
    }
    let mut flat = vec![];
    flatten(actual, &mut flat);
    assert_eq!(flat.len(), expected.len(), "shape of {}", actual);
    for (a, e) in flat.iter().zip(expected) {
        assert!(is_close(*a, *e, 1e-12, 1e-12), "{} is not close to {:?}", actual, expected);
    }
}
