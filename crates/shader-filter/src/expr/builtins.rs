use std::f64::consts::{E, PI};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Environment, Function};

static SAMPLE_RATE: AtomicU64 = AtomicU64::new(48_000f64.to_bits());
static OUTPUT_CHANNELS: AtomicU64 = AtomicU64::new(2f64.to_bits());

/// Record the host's audio output format. Read by `sample_rate` and
/// `channels` at the next reload.
pub fn set_audio_info(sample_rate: f64, channels: f64) {
    SAMPLE_RATE.store(sample_rate.to_bits(), Ordering::Relaxed);
    OUTPUT_CHANNELS.store(channels.to_bits(), Ordering::Relaxed);
}

pub fn sample_rate() -> f64 {
    f64::from_bits(SAMPLE_RATE.load(Ordering::Relaxed))
}

pub fn output_channels() -> f64 {
    f64::from_bits(OUTPUT_CHANNELS.load(Ordering::Relaxed))
}

pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

pub fn degrees(radians: f64) -> f64 {
    radians * (180.0 / PI)
}

pub fn radians(degrees: f64) -> f64 {
    degrees * (PI / 180.0)
}

pub fn mel_from_hz(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn hz_from_mel(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

fn fac(n: f64) -> f64 {
    if n < 0.0 || n.is_nan() {
        return f64::NAN;
    }
    let n = n.floor();
    if n > 170.0 {
        return f64::INFINITY;
    }
    let mut result = 1.0;
    let mut i = 2.0;
    while i <= n {
        result *= i;
        i += 1.0;
    }
    result
}

fn ncr(n: f64, r: f64) -> f64 {
    if n < 0.0 || r < 0.0 || n < r {
        return f64::NAN;
    }
    let (n, r) = (n.floor(), r.floor());
    let r = r.min(n - r);
    let mut result = 1.0;
    let mut i = 1.0;
    while i <= r {
        result = result * (n - r + i) / i;
        i += 1.0;
    }
    result
}

fn npr(n: f64, r: f64) -> f64 {
    ncr(n, r) * fac(r)
}

fn abs(v: f64) -> f64 {
    v.abs()
}

/// Install constants, math functions and audio globals.
pub fn install(env: &mut Environment) {
    let unary: &[(&str, fn(f64) -> f64)] = &[
        ("abs", abs),
        ("acos", f64::acos),
        ("asin", f64::asin),
        ("atan", f64::atan),
        ("ceil", f64::ceil),
        ("cos", f64::cos),
        ("cosh", f64::cosh),
        ("exp", f64::exp),
        ("fac", fac),
        ("floor", f64::floor),
        ("ln", f64::ln),
        ("log", f64::log10),
        ("log10", f64::log10),
        ("sin", f64::sin),
        ("sinh", f64::sinh),
        ("sqrt", f64::sqrt),
        ("tan", f64::tan),
        ("tanh", f64::tanh),
        ("degrees", degrees),
        ("radians", radians),
        ("mel_from_hz", mel_from_hz),
        ("hz_from_mel", hz_from_mel),
    ];
    for (name, f) in unary {
        env.define_function(name, Function::Unary(*f));
    }

    let binary: &[(&str, fn(f64, f64) -> f64)] = &[
        ("atan2", f64::atan2),
        ("pow", f64::powf),
        ("ncr", ncr),
        ("npr", npr),
    ];
    for (name, f) in binary {
        env.define_function(name, Function::Binary(*f));
    }

    env.define_function("clamp", Function::Ternary(clamp));
    env.define_function("random", Function::Random);

    env.define_constant("pi", PI);
    env.define_constant("e", E);
    env.define_constant("float_max", f64::from(f32::MAX));
    env.define_constant("float_min", f64::from(f32::MIN_POSITIVE));
    env.define_constant("int_max", f64::from(i32::MAX));
    env.define_constant("int_min", f64::from(i32::MIN));
    env.define_constant("sample_rate", sample_rate());
    env.define_constant("channels", output_channels());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn mel_hz_roundtrip() {
        let mel = mel_from_hz(1000.0);
        assert!(approx_eq(mel, 999.985, 1e-2));
        assert!(approx_eq(hz_from_mel(mel), 1000.0, 1e-6));
    }

    #[test]
    fn degree_radian_conversion() {
        assert!(approx_eq(degrees(PI / 2.0), 90.0, 1e-9));
        assert!(approx_eq(radians(180.0), PI, 1e-12));
    }

    #[test]
    fn combinatorics() {
        assert!(approx_eq(fac(5.0), 120.0, 1e-9));
        assert!(approx_eq(ncr(5.0, 2.0), 10.0, 1e-9));
        assert!(approx_eq(npr(5.0, 2.0), 20.0, 1e-9));
        assert!(fac(-1.0).is_nan());
    }

    #[test]
    fn install_registers_library() {
        let mut env = Environment::new(Some(0));
        install(&mut env);
        for name in [
            "clamp", "degrees", "radians", "mel_from_hz", "hz_from_mel", "random",
            "float_max", "float_min", "int_max", "int_min", "sample_rate", "channels",
        ] {
            assert!(env.lookup(name).is_some(), "missing {name}");
        }
    }
}
