// OS library
// Implements: time, clock, date, getenv

use chrono::{Datelike, Local, TimeZone, Timelike, Utc};

use crate::lib_registry::{LibraryModule, arg, check_table};
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::{LuaError, LuaResult, LuaVm, RuntimeErrorKind};

pub fn create_os_lib() -> LibraryModule {
    crate::lib_module!("os", {
        "time" => os_time,
        "clock" => os_clock,
        "date" => os_date,
        "getenv" => os_getenv,
    })
}

/// time() - current epoch seconds; time(t) - epoch of a field table.
fn os_time(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        None | Some(LuaValue::Nil) => {
            Ok(vec![LuaValue::Number(Utc::now().timestamp() as f64)])
        }
        Some(LuaValue::Table(_)) => {
            let table = check_table(vm, &args, 0, "time")?;
            let field = |name: &str, default: Option<i64>| -> LuaResult<i64> {
                let value = table.borrow().get_str(name);
                match value.and_then(|v| v.as_number()) {
                    Some(n) => Ok(n as i64),
                    None => default.ok_or_else(|| {
                        vm.runtime_error(
                            RuntimeErrorKind::BadArgument,
                            format!("field '{}' missing in date table", name),
                        )
                    }),
                }
            };
            let year = field("year", None)?;
            let month = field("month", None)?;
            let day = field("day", None)?;
            let hour = field("hour", Some(12))?;
            let min = field("min", Some(0))?;
            let sec = field("sec", Some(0))?;
            let timestamp = Local
                .with_ymd_and_hms(
                    year as i32,
                    month as u32,
                    day as u32,
                    hour as u32,
                    min as u32,
                    sec as u32,
                )
                .single()
                .ok_or_else(|| LuaError::Host {
                    message: "time result cannot be represented".to_string(),
                    inner: None,
                })?
                .timestamp();
            Ok(vec![LuaValue::Number(timestamp as f64)])
        }
        Some(other) => Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            format!(
                "bad argument #1 to 'time' (table expected, got {})",
                other.type_name()
            ),
        )),
    }
}

/// clock() - seconds since this context was created.
fn os_clock(vm: &mut LuaVm, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Number(vm.start.elapsed().as_secs_f64())])
}

/// date([format [, time]]) - strftime-style formatting; a leading `!` means
/// UTC, and `*t` produces a field table.
fn os_date(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let format = match arg(&args, 0) {
        LuaValue::Nil => "%c".to_string(),
        value => value.coerce_string().ok_or_else(|| {
            vm.runtime_error(
                RuntimeErrorKind::BadArgument,
                "bad argument #1 to 'date' (string expected)",
            )
        })?,
    };
    let timestamp = args.get(1).and_then(|v| v.as_number()).map(|n| n as i64);

    let (format, utc) = match format.strip_prefix('!') {
        Some(rest) => (rest.to_string(), true),
        None => (format, false),
    };

    let moment_utc = match timestamp {
        Some(ts) => Utc.timestamp_opt(ts, 0).single().ok_or_else(|| LuaError::Host {
            message: "time value out of range".to_string(),
            inner: None,
        })?,
        None => Utc::now(),
    };

    if format == "*t" || format == "!*t" {
        let mut fields = LuaTable::new();
        let (year, month, day, hour, min, sec, wday, yday) = if utc {
            let m = moment_utc;
            (
                m.year(),
                m.month(),
                m.day(),
                m.hour(),
                m.minute(),
                m.second(),
                m.weekday().number_from_sunday(),
                m.ordinal(),
            )
        } else {
            let m = moment_utc.with_timezone(&Local);
            (
                m.year(),
                m.month(),
                m.day(),
                m.hour(),
                m.minute(),
                m.second(),
                m.weekday().number_from_sunday(),
                m.ordinal(),
            )
        };
        let mut put = |name: &str, value: f64| {
            let _ = fields.set(LuaValue::from(name), LuaValue::Number(value));
        };
        put("year", year as f64);
        put("month", month as f64);
        put("day", day as f64);
        put("hour", hour as f64);
        put("min", min as f64);
        put("sec", sec as f64);
        put("wday", wday as f64);
        put("yday", yday as f64);
        let _ = fields.set(LuaValue::from("isdst"), LuaValue::Boolean(false));
        return Ok(vec![LuaValue::table(fields)]);
    }

    let rendered = if utc {
        moment_utc.format(&format).to_string()
    } else {
        moment_utc.with_timezone(&Local).format(&format).to_string()
    };
    Ok(vec![LuaValue::from(rendered)])
}

fn os_getenv(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let name = match arg(&args, 0).as_str() {
        Some(name) => name.to_string(),
        None => {
            return Err(vm.runtime_error(
                RuntimeErrorKind::BadArgument,
                "bad argument #1 to 'getenv' (string expected)",
            ));
        }
    };
    Ok(vec![
        std::env::var(&name)
            .map(LuaValue::from)
            .unwrap_or(LuaValue::Nil),
    ])
}
