// Math library
// Implements: abs, ceil, floor, sqrt, sin, cos, tan, asin, acos, atan, exp,
// log, pow, fmod, modf, max, min, random, randomseed, deg, rad, pi, huge

use rand::{Rng, SeedableRng};

use crate::lib_registry::{LibraryModule, arg, check_number};
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaResult, LuaVm, RuntimeErrorKind};

pub fn create_math_lib() -> LibraryModule {
    let module = crate::lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "floor" => math_floor,
        "sqrt" => math_sqrt,
        "sin" => math_sin,
        "cos" => math_cos,
        "tan" => math_tan,
        "asin" => math_asin,
        "acos" => math_acos,
        "atan" => math_atan,
        "exp" => math_exp,
        "log" => math_log,
        "pow" => math_pow,
        "fmod" => math_fmod,
        "modf" => math_modf,
        "max" => math_max,
        "min" => math_min,
        "random" => math_random,
        "randomseed" => math_randomseed,
        "deg" => math_deg,
        "rad" => math_rad,
    });

    module
        .with_value("pi", |_vm| LuaValue::Number(std::f64::consts::PI))
        .with_value("huge", |_vm| LuaValue::Number(f64::INFINITY))
}

fn math_abs(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "abs")?;
    Ok(vec![LuaValue::Number(x.abs())])
}

fn math_ceil(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "ceil")?;
    Ok(vec![LuaValue::Number(x.ceil())])
}

fn math_floor(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "floor")?;
    Ok(vec![LuaValue::Number(x.floor())])
}

fn math_sqrt(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "sqrt")?;
    Ok(vec![LuaValue::Number(x.sqrt())])
}

fn math_sin(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "sin")?;
    Ok(vec![LuaValue::Number(x.sin())])
}

fn math_cos(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "cos")?;
    Ok(vec![LuaValue::Number(x.cos())])
}

fn math_tan(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "tan")?;
    Ok(vec![LuaValue::Number(x.tan())])
}

fn math_asin(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "asin")?;
    Ok(vec![LuaValue::Number(x.asin())])
}

fn math_acos(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "acos")?;
    Ok(vec![LuaValue::Number(x.acos())])
}

fn math_atan(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let y = check_number(vm, &args, 0, "atan")?;
    let x = args.get(1).and_then(|v| v.coerce_number()).unwrap_or(1.0);
    Ok(vec![LuaValue::Number(y.atan2(x))])
}

fn math_exp(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "exp")?;
    Ok(vec![LuaValue::Number(x.exp())])
}

fn math_log(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "log")?;
    let result = match args.get(1).and_then(|v| v.coerce_number()) {
        Some(base) => x.log(base),
        None => x.ln(),
    };
    Ok(vec![LuaValue::Number(result)])
}

fn math_pow(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "pow")?;
    let y = check_number(vm, &args, 1, "pow")?;
    Ok(vec![LuaValue::Number(x.powf(y))])
}

fn math_fmod(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "fmod")?;
    let y = check_number(vm, &args, 1, "fmod")?;
    Ok(vec![LuaValue::Number(x % y)])
}

/// modf(x) - integral and fractional parts.
fn math_modf(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "modf")?;
    Ok(vec![
        LuaValue::Number(x.trunc()),
        LuaValue::Number(x.fract()),
    ])
}

fn math_max(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut best = check_number(vm, &args, 0, "max")?;
    for index in 1..args.len() {
        best = best.max(check_number(vm, &args, index, "max")?);
    }
    Ok(vec![LuaValue::Number(best)])
}

fn math_min(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut best = check_number(vm, &args, 0, "min")?;
    for index in 1..args.len() {
        best = best.min(check_number(vm, &args, index, "min")?);
    }
    Ok(vec![LuaValue::Number(best)])
}

/// random() -> [0,1); random(m) -> [1,m]; random(m,n) -> [m,n].
fn math_random(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let result = match (args.first(), args.get(1)) {
        (None, _) => vm.rng.gen_range(0.0..1.0),
        (Some(_), None) => {
            let m = check_number(vm, &args, 0, "random")? as i64;
            if m < 1 {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #1 to 'random' (interval is empty)",
                ));
            }
            vm.rng.gen_range(1..=m) as f64
        }
        (Some(_), Some(_)) => {
            let low = check_number(vm, &args, 0, "random")? as i64;
            let high = check_number(vm, &args, 1, "random")? as i64;
            if low > high {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #2 to 'random' (interval is empty)",
                ));
            }
            vm.rng.gen_range(low..=high) as f64
        }
    };
    Ok(vec![LuaValue::Number(result)])
}

fn math_randomseed(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let seed = arg(&args, 0).coerce_number().unwrap_or(0.0);
    vm.rng = rand::rngs::StdRng::seed_from_u64(seed.to_bits());
    Ok(Vec::new())
}

fn math_deg(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "deg")?;
    Ok(vec![LuaValue::Number(x.to_degrees())])
}

fn math_rad(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(vm, &args, 0, "rad")?;
    Ok(vec![LuaValue::Number(x.to_radians())])
}
