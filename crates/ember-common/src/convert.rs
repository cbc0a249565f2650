//! String conversion for the parameter binder.
//!
//! Values are written in the plain whitespace separated form used by particle
//! definition files: `"1 0.5 0"` for vectors, `"1 1 1 0.5"` for colours,
//! `"true"` / `"false"` for flags.

use crate::colour::Colour;
use crate::error::ParamError;
use glam::Vec3;

fn invalid(name: &str, value: &str, expected: &'static str) -> ParamError {
    ParamError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Parses a single real number.
pub fn parse_real(name: &str, value: &str) -> Result<f32, ParamError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(name, value, "a real number"))
}

/// Parses an unsigned integer. Real numbers are accepted and truncated.
pub fn parse_uint(name: &str, value: &str) -> Result<usize, ParamError> {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<usize>() {
        return Ok(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v as usize),
        _ => Err(invalid(name, value, "an unsigned integer")),
    }
}

/// Parses `true`/`false` (also `on`/`off`, `yes`/`no`, `1`/`0`).
pub fn parse_bool(name: &str, value: &str) -> Result<bool, ParamError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(invalid(name, value, "a boolean")),
    }
}

fn parse_reals(value: &str) -> Option<Vec<f32>> {
    value
        .split_whitespace()
        .map(|s| s.parse::<f32>().ok().filter(|v| v.is_finite()))
        .collect()
}

/// Parses three reals separated by whitespace.
pub fn parse_vec3(name: &str, value: &str) -> Result<Vec3, ParamError> {
    match parse_reals(value).as_deref() {
        Some([x, y, z]) => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(invalid(name, value, "three real numbers")),
    }
}

/// Parses a colour from three (opaque) or four reals.
pub fn parse_colour(name: &str, value: &str) -> Result<Colour, ParamError> {
    match parse_reals(value).as_deref() {
        Some([r, g, b]) => Ok(Colour::rgb(*r, *g, *b)),
        Some([r, g, b, a]) => Ok(Colour::new(*r, *g, *b, *a)),
        _ => Err(invalid(name, value, "three or four real numbers")),
    }
}

/// Formats a vector in the form accepted by [`parse_vec3`].
#[must_use]
pub fn format_vec3(v: Vec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

/// Formats a flag in the form accepted by [`parse_bool`].
#[must_use]
pub fn format_bool(v: bool) -> String {
    if v { "true" } else { "false" }.to_string()
}
