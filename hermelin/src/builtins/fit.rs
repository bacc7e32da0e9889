//! Fitting built-ins

use super::{ArgSpec, NativeFn, TypeSet, check_args, real_array, real_array_arg};
use crate::interp::{Context, ErrorKind, InterpResult, RuntimeError, Symbol, Value};
use std::collections::HashMap;

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("fit_linear", builtin_fit_linear),
    ("polyval", builtin_polyval),
];

/// Result of a straight-line fit `y = slope * x + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub offset: f64,
    pub slope_err: f64,
    pub offset_err: f64,
    pub chi2: f64,
}

impl LinearFit {
    fn into_value(self) -> InterpResult<Value> {
        let mut map = HashMap::new();
        for (name, x) in [
            ("slope", self.slope),
            ("offset", self.offset),
            ("slope_err", self.slope_err),
            ("offset_err", self.offset_err),
            ("chi2", self.chi2),
        ] {
            map.insert(Value::from(name).to_key()?, Symbol::new(Value::Real(x)));
        }
        Ok(Value::Map(map))
    }
}

fn fit_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(ErrorKind::Argument, message)
}

/// Weighted linear least squares with weights `1 / sigma^2`
pub fn linear_fit(x: &[f64], y: &[f64], sigma: Option<&[f64]>) -> InterpResult<LinearFit> {
    if x.len() != y.len() {
        return Err(fit_error(format!(
            "fit_linear: x has {} points but y has {}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(fit_error(format!(
            "fit_linear: expected at least 2 points, got {}",
            x.len()
        )));
    }
    let weights: Vec<f64> = match sigma {
        Some(sigma) => {
            if sigma.len() != x.len() {
                return Err(fit_error(format!(
                    "fit_linear: sigma has {} entries but there are {} points",
                    sigma.len(),
                    x.len()
                )));
            }
            if let Some(bad) = sigma.iter().find(|s| s.is_nan() || **s <= 0.0) {
                return Err(fit_error(format!(
                    "fit_linear: sigma must be positive, got {bad}"
                )));
            }
            sigma.iter().map(|s| 1.0 / (s * s)).collect()
        }
        None => vec![1.0; x.len()],
    };

    let mut s = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&xi, &yi), &w) in x.iter().zip(y).zip(&weights) {
        s += w;
        sx += w * xi;
        sy += w * yi;
        sxx += w * xi * xi;
        sxy += w * xi * yi;
    }
    let delta = s * sxx - sx * sx;
    if delta.abs() <= f64::EPSILON * (s * sxx).abs() {
        return Err(fit_error("fit_linear: all x values are equal"));
    }

    let slope = (s * sxy - sx * sy) / delta;
    let offset = (sxx * sy - sx * sxy) / delta;
    let chi2 = x
        .iter()
        .zip(y)
        .zip(&weights)
        .map(|((&xi, &yi), &w)| w * (yi - offset - slope * xi).powi(2))
        .sum::<f64>();

    Ok(LinearFit {
        slope,
        offset,
        slope_err: (s / delta).sqrt(),
        offset_err: (sxx / delta).sqrt(),
        chi2,
    })
}

/// fit_linear(x, y[, sigma]) returns {slope, offset, slope_err, offset_err, chi2}
fn builtin_fit_linear(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "fit_linear",
        args,
        &[
            ArgSpec::required(TypeSet::ARRAY),
            ArgSpec::required(TypeSet::ARRAY),
            ArgSpec::optional(TypeSet::ARRAY),
        ],
    )?;
    let x = real_array_arg("fit_linear", args, 0)?;
    let y = real_array_arg("fit_linear", args, 1)?;
    let sigma = match args.len() {
        3 => Some(real_array_arg("fit_linear", args, 2)?),
        _ => None,
    };
    let fit = linear_fit(&x, &y, sigma.as_deref())?;
    tracing::debug!(points = x.len(), chi2 = fit.chi2, "linear fit");
    Ok(Some(fit.into_value()?))
}

/// Evaluate a polynomial, coefficients highest power first
pub fn polynomial(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, c| acc * x + c)
}

/// polyval(coeffs, x) with `x` a number or an array
fn builtin_polyval(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "polyval",
        args,
        &[
            ArgSpec::required(TypeSet::ARRAY),
            ArgSpec::required(TypeSet::NUMERIC.union(TypeSet::ARRAY)),
        ],
    )?;
    let coeffs = real_array_arg("polyval", args, 0)?;
    if matches!(*args[1].borrow(), Value::Array(_)) {
        let xs = real_array_arg("polyval", args, 1)?;
        return Ok(Some(real_array(xs.into_iter().map(|x| polynomial(&coeffs, x)))));
    }
    let x = super::real_arg("polyval", args, 1)?;
    Ok(Some(Value::Real(polynomial(&coeffs, x))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_fit(&x, &y, None).unwrap();
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.offset, 1.0));
        assert!(close(fit.chi2, 0.0));
        // unit weights: slope_err = sqrt(n / delta) with delta = n*sxx - sx^2 = 4*14 - 36
        assert!(close(fit.slope_err, (4.0f64 / 20.0).sqrt()));
    }

    #[test]
    fn test_weights_pull_towards_precise_points() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 5.0];
        let loose = linear_fit(&x, &y, Some(&[1.0, 1.0, 100.0])).unwrap();
        let even = linear_fit(&x, &y, None).unwrap();
        assert!(loose.slope < even.slope);
        assert!((loose.slope - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(linear_fit(&[1.0], &[1.0], None).is_err());
        assert!(linear_fit(&[1.0, 2.0], &[1.0], None).is_err());
        assert!(linear_fit(&[1.0, 1.0], &[1.0, 2.0], None).is_err());
        let err = linear_fit(&[0.0, 1.0], &[1.0, 2.0], Some(&[1.0, 0.0])).unwrap_err();
        assert_eq!(err.message, "fit_linear: sigma must be positive, got 0");
    }

    #[test]
    fn test_fit_linear_builtin_returns_map() {
        let mut ctx = Context::new();
        let x = Symbol::new(Value::from(vec![Value::Int(0), Value::Int(1), Value::Int(2)]));
        let y = Symbol::new(Value::from(vec![Value::Int(2), Value::Int(2), Value::Int(2)]));
        let result = builtin_fit_linear(&[x, y], &mut ctx).unwrap().unwrap();
        let Value::Map(map) = &result else {
            panic!("expected map, got {result}");
        };
        assert_eq!(map.len(), 5);
        let slope = map[&Value::from("slope").to_key().unwrap()].get();
        let offset = map[&Value::from("offset").to_key().unwrap()].get();
        assert_eq!(slope, Value::Real(0.0));
        assert_eq!(offset, Value::Real(2.0));
    }

    #[test]
    fn test_polyval() {
        assert_eq!(polynomial(&[1.0, -2.0, 1.0], 3.0), 4.0);
        assert_eq!(polynomial(&[], 3.0), 0.0);
        let mut ctx = Context::new();
        let coeffs = Symbol::new(Value::from(vec![Value::Int(2), Value::Int(1)]));
        let xs = Symbol::new(Value::from(vec![Value::Int(0), Value::Int(1)]));
        let result = builtin_polyval(&[coeffs, xs], &mut ctx).unwrap().unwrap();
        assert_eq!(result.to_string(), "[1, 3]");
    }
}
