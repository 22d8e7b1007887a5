use crate::phase::Phase;
use num_complex::Complex64;
use pretty_dtoa::{dtoa, FmtFloatConfig};

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(6);

pub fn format_f64(f: f64) -> String {
    dtoa(f, FLOAT_CONFIG)
}

pub fn format_f64_vec(v: &[f64]) -> String {
    let a: Vec<String> = v.iter().map(|f| dtoa(*f, FLOAT_CONFIG)).collect();
    format!("[{}]", a.join(", "))
}

pub fn format_complex(z: &Complex64) -> String {
    format!(
        "{}{}j{}",
        dtoa(z.re, FLOAT_CONFIG),
        if z.im.is_sign_negative() { "-" } else { "+" },
        dtoa(z.im.abs(), FLOAT_CONFIG)
    )
}

pub fn format_rect_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_complex).collect();
    format!("[{}]", a.join(", "))
}

pub fn format_polar(z: &Complex64) -> String {
    format!(
        "{}\u{2220}{}\u{00B0}",
        dtoa(z.norm(), FLOAT_CONFIG),
        dtoa(z.arg().to_degrees(), FLOAT_CONFIG)
    )
}

/// Phase-labelled phasors, e.g. `a: 230.9∠0°, n: 0∠0°`.
pub fn format_phasors(phases: &[Phase], v: &[Complex64]) -> String {
    let a: Vec<String> = phases
        .iter()
        .zip(v)
        .map(|(p, z)| format!("{}: {}", p, format_polar(z)))
        .collect();
    a.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;

    #[test]
    fn phasor_labels() {
        let s = format_phasors(&[Phase::A, Phase::N], &[cmplx!(0.0, 2.0), cmplx!()]);
        assert_eq!(s, "a: 2\u{2220}90\u{00B0}, n: 0\u{2220}0\u{00B0}");
    }

    #[test]
    fn rectangular() {
        assert_eq!(format_complex(&cmplx!(1.5, -2.0)), "1.5-j2");
    }
}
