use std::{fmt, fs, path::Path, process::Command, thread, time::Duration};

use chrono::{
    format::{Item, StrftimeItems},
    Local, Utc,
};
use indexmap::IndexMap;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::value::{Value, ValueKind};

pub const NAMESPACES: [&str; 7] = ["math", "string", "time", "system", "file", "json", "random"];

/// Host-side state the stdlib is allowed to touch.
pub struct HostState {
    pub rng: StdRng,
    pub exit_code: Option<i32>,
}

impl HostState {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            exit_code: None,
        }
    }

    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

pub type StdFn = fn(&mut HostState, &[Value]) -> Value;

/// Dispatch table keyed by `namespace_function`. Functions report failures
/// as plain `"Error: namespace.function() reason"` strings, never as
/// engine errors.
pub struct Registry {
    entries: IndexMap<&'static str, StdFn>,
}

impl Registry {
    pub fn lookup(&self, namespace: &str, function: &str) -> Option<StdFn> {
        let key = format!("{namespace}_{function}");
        self.entries.get(key.as_str()).copied()
    }

    pub fn is_namespace(name: &str) -> bool {
        NAMESPACES.contains(&name)
    }
}

pub fn install() -> Registry {
    let mut entries: IndexMap<&'static str, StdFn> = IndexMap::new();

    entries.insert("math_sin", math_sin);
    entries.insert("math_cos", math_cos);
    entries.insert("math_tan", math_tan);
    entries.insert("math_sqrt", math_sqrt);
    entries.insert("math_pow", math_pow);
    entries.insert("math_abs", math_abs);
    entries.insert("math_floor", math_floor);
    entries.insert("math_ceil", math_ceil);
    entries.insert("math_round", math_round);
    entries.insert("math_max", math_max);
    entries.insert("math_min", math_min);
    entries.insert("math_log", math_log);
    entries.insert("math_log10", math_log10);
    entries.insert("math_exp", math_exp);
    entries.insert("math_pi", math_pi);
    entries.insert("math_e", math_e);

    entries.insert("string_length", string_length);
    entries.insert("string_concat", string_concat);
    entries.insert("string_upper", string_upper);
    entries.insert("string_lower", string_lower);
    entries.insert("string_replace", string_replace);
    entries.insert("string_split", string_split);
    entries.insert("string_join", string_join);
    entries.insert("string_trim", string_trim);
    entries.insert("string_substring", string_substring);
    entries.insert("string_startswith", string_startswith);
    entries.insert("string_endswith", string_endswith);

    entries.insert("time_now", time_now);
    entries.insert("time_sleep", time_sleep);
    entries.insert("time_date", time_date);
    entries.insert("time_timestamp", time_timestamp);
    entries.insert("time_format", time_format);

    entries.insert("system_os", system_os);
    entries.insert("system_env", system_env);
    entries.insert("system_exit", system_exit);
    entries.insert("system_exec", system_exec);

    entries.insert("file_exists", file_exists);
    entries.insert("file_read", file_read);
    entries.insert("file_write", file_write);
    entries.insert("file_append", file_append);
    entries.insert("file_delete", file_delete);
    entries.insert("file_size", file_size);
    entries.insert("file_readlines", file_readlines);

    entries.insert("json_parse", json_parse);
    entries.insert("json_stringify", json_stringify);

    entries.insert("random_int", random_int);
    entries.insert("random_float", random_float);
    entries.insert("random_choice", random_choice);
    entries.insert("random_bool", random_bool);

    Registry { entries }
}

fn fail(name: &str, reason: impl fmt::Display) -> Value {
    Value::string(format!("Error: {name}() {reason}"))
}

fn arity(args: &[Value], expected: usize, name: &str) -> Result<(), Value> {
    if args.len() != expected {
        let noun = if expected == 1 { "argument" } else { "arguments" };
        return Err(fail(
            name,
            format!("takes exactly {expected} {noun}, got {}", args.len()),
        ));
    }
    Ok(())
}

fn number_at(args: &[Value], idx: usize, name: &str) -> Result<f64, Value> {
    match args.get(idx).and_then(Value::as_number) {
        Some(n) => Ok(n),
        None => Err(fail(name, "invalid numeric argument")),
    }
}

fn int_at(args: &[Value], idx: usize, name: &str) -> Result<i64, Value> {
    Ok(number_at(args, idx, name)?.trunc() as i64)
}

fn list_at<'a>(args: &'a [Value], idx: usize, name: &str) -> Result<&'a Vec<Value>, Value> {
    match args.get(idx).map(|value| &*value.0) {
        Some(ValueKind::List(items)) => Ok(items),
        _ => Err(fail(name, "expects a list argument")),
    }
}

fn unary_number(args: &[Value], name: &str) -> Result<f64, Value> {
    arity(args, 1, name)?;
    number_at(args, 0, name)
}

fn binary_numbers(args: &[Value], name: &str) -> Result<(f64, f64), Value> {
    arity(args, 2, name)?;
    Ok((number_at(args, 0, name)?, number_at(args, 1, name)?))
}

fn math_sin(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.sin") {
        Ok(n) => Value::number(n.sin()),
        Err(err) => err,
    }
}

fn math_cos(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.cos") {
        Ok(n) => Value::number(n.cos()),
        Err(err) => err,
    }
}

fn math_tan(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.tan") {
        Ok(n) => Value::number(n.tan()),
        Err(err) => err,
    }
}

fn math_sqrt(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.sqrt") {
        Ok(n) if n >= 0.0 => Value::number(n.sqrt()),
        Ok(_) => fail("math.sqrt", "expects a non-negative argument"),
        Err(err) => err,
    }
}

fn math_pow(_: &mut HostState, args: &[Value]) -> Value {
    match binary_numbers(args, "math.pow") {
        Ok((base, exp)) => Value::number(base.powf(exp)),
        Err(err) => err,
    }
}

fn math_abs(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.abs") {
        Ok(n) => Value::number(n.abs()),
        Err(err) => err,
    }
}

fn math_floor(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.floor") {
        Ok(n) => Value::number(n.floor()),
        Err(err) => err,
    }
}

fn math_ceil(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.ceil") {
        Ok(n) => Value::number(n.ceil()),
        Err(err) => err,
    }
}

fn math_round(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.round") {
        Ok(n) => Value::number(n.round()),
        Err(err) => err,
    }
}

fn math_max(_: &mut HostState, args: &[Value]) -> Value {
    match binary_numbers(args, "math.max") {
        Ok((a, b)) => Value::number(a.max(b)),
        Err(err) => err,
    }
}

fn math_min(_: &mut HostState, args: &[Value]) -> Value {
    match binary_numbers(args, "math.min") {
        Ok((a, b)) => Value::number(a.min(b)),
        Err(err) => err,
    }
}

fn math_log(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.log") {
        Ok(n) if n > 0.0 => Value::number(n.ln()),
        Ok(_) => fail("math.log", "expects a positive argument"),
        Err(err) => err,
    }
}

fn math_log10(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.log10") {
        Ok(n) if n > 0.0 => Value::number(n.log10()),
        Ok(_) => fail("math.log10", "expects a positive argument"),
        Err(err) => err,
    }
}

fn math_exp(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "math.exp") {
        Ok(n) => Value::number(n.exp()),
        Err(err) => err,
    }
}

fn math_pi(_: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "math.pi") {
        Ok(()) => Value::number(std::f64::consts::PI),
        Err(err) => err,
    }
}

fn math_e(_: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "math.e") {
        Ok(()) => Value::number(std::f64::consts::E),
        Err(err) => err,
    }
}

// String functions coerce every argument through its display form.

fn string_length(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "string.length") {
        return err;
    }
    Value::number(args[0].to_string().chars().count() as f64)
}

fn string_concat(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "string.concat") {
        return err;
    }
    Value::string(format!("{}{}", args[0], args[1]))
}

fn string_upper(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "string.upper") {
        return err;
    }
    Value::string(args[0].to_string().to_uppercase())
}

fn string_lower(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "string.lower") {
        return err;
    }
    Value::string(args[0].to_string().to_lowercase())
}

fn string_replace(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 3, "string.replace") {
        return err;
    }
    let text = args[0].to_string();
    let from = args[1].to_string();
    let to = args[2].to_string();
    // An empty search matches every char boundary and interleaves.
    Value::string(text.replace(&from, &to))
}

fn string_split(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "string.split") {
        return err;
    }
    let text = args[0].to_string();
    let separator = args[1].to_string();
    if separator.is_empty() {
        return fail("string.split", "separator must not be empty");
    }
    Value::list(text.split(&separator).map(Value::string).collect())
}

fn string_join(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "string.join") {
        return err;
    }
    let items = match list_at(args, 0, "string.join") {
        Ok(items) => items,
        Err(err) => return err,
    };
    let separator = args[1].to_string();
    let pieces: Vec<String> = items.iter().map(Value::to_string).collect();
    Value::string(pieces.join(&separator))
}

fn string_trim(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "string.trim") {
        return err;
    }
    Value::string(args[0].to_string().trim().to_string())
}

fn string_substring(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 3, "string.substring") {
        return err;
    }
    let text = args[0].to_string();
    let start = match int_at(args, 1, "string.substring") {
        Ok(n) => n,
        Err(err) => return err,
    };
    let end = match int_at(args, 2, "string.substring") {
        Ok(n) => n,
        Err(err) => return err,
    };
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    // Negative indices count from the end, as in slice notation.
    let start = if start < 0 { len + start } else { start };
    let end = if end < 0 { len + end } else { end };
    let start = start.clamp(0, len) as usize;
    let end = end.clamp(0, len) as usize;
    if start >= end {
        return Value::string("");
    }
    Value::string(chars[start..end].iter().collect::<String>())
}

fn string_startswith(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "string.startswith") {
        return err;
    }
    Value::bool(args[0].to_string().starts_with(&args[1].to_string()))
}

fn string_endswith(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "string.endswith") {
        return err;
    }
    Value::bool(args[0].to_string().ends_with(&args[1].to_string()))
}

fn time_now(_: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "time.now") {
        Ok(()) => Value::string(Local::now().format("%H:%M:%S").to_string()),
        Err(err) => err,
    }
}

fn time_sleep(_: &mut HostState, args: &[Value]) -> Value {
    match unary_number(args, "time.sleep") {
        Ok(secs) if secs >= 0.0 => {
            thread::sleep(Duration::from_secs_f64(secs));
            Value::none()
        }
        Ok(_) => fail("time.sleep", "expects a non-negative duration"),
        Err(err) => err,
    }
}

fn time_date(_: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "time.date") {
        Ok(()) => Value::string(Local::now().format("%Y-%m-%d").to_string()),
        Err(err) => err,
    }
}

fn time_timestamp(_: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "time.timestamp") {
        Ok(()) => Value::number(Utc::now().timestamp_millis() as f64 / 1000.0),
        Err(err) => err,
    }
}

fn time_format(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "time.format") {
        return err;
    }
    let pattern = args[0].to_string();
    let items: Vec<Item<'_>> = StrftimeItems::new(&pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return fail("time.format", "invalid format pattern");
    }
    Value::string(Local::now().format_with_items(items.into_iter()).to_string())
}

fn system_os(_: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "system.os") {
        Ok(()) => Value::string(std::env::consts::OS),
        Err(err) => err,
    }
}

fn system_env(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "system.env") {
        return err;
    }
    Value::string(std::env::var(args[0].to_string()).unwrap_or_default())
}

/// Records the exit request on the host; never exits the process itself.
fn system_exit(host: &mut HostState, args: &[Value]) -> Value {
    let code = match args.len() {
        0 => 0,
        1 => match int_at(args, 0, "system.exit") {
            Ok(code) => code as i32,
            Err(err) => return err,
        },
        _ => return fail("system.exit", "takes at most 1 argument"),
    };
    host.exit_code = Some(code);
    Value::none()
}

fn system_exec(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "system.exec") {
        return err;
    }
    let command = args[0].to_string();
    match Command::new("sh").arg("-c").arg(&command).output() {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).to_string();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            Value::string(text.trim_end().to_string())
        }
        Err(err) => fail("system.exec", err),
    }
}

fn file_exists(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "file.exists") {
        return err;
    }
    Value::bool(Path::new(&args[0].to_string()).exists())
}

fn file_read(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "file.read") {
        return err;
    }
    match fs::read_to_string(args[0].to_string()) {
        Ok(contents) => Value::string(contents),
        Err(err) => fail("file.read", err),
    }
}

fn file_write(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "file.write") {
        return err;
    }
    match fs::write(args[0].to_string(), args[1].to_string()) {
        Ok(()) => Value::bool(true),
        Err(err) => fail("file.write", err),
    }
}

fn file_append(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "file.append") {
        return err;
    }
    let path = args[0].to_string();
    let result = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| {
            use std::io::Write;
            file.write_all(args[1].to_string().as_bytes())
        });
    match result {
        Ok(()) => Value::bool(true),
        Err(err) => fail("file.append", err),
    }
}

fn file_delete(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "file.delete") {
        return err;
    }
    match fs::remove_file(args[0].to_string()) {
        Ok(()) => Value::bool(true),
        Err(err) => fail("file.delete", err),
    }
}

fn file_size(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "file.size") {
        return err;
    }
    match fs::metadata(args[0].to_string()) {
        Ok(metadata) => Value::number(metadata.len() as f64),
        Err(err) => fail("file.size", err),
    }
}

fn file_readlines(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "file.readlines") {
        return err;
    }
    match fs::read_to_string(args[0].to_string()) {
        Ok(contents) => Value::list(contents.lines().map(Value::string).collect()),
        Err(err) => fail("file.readlines", err),
    }
}

fn json_parse(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "json.parse") {
        return err;
    }
    match serde_json::from_str::<serde_json::Value>(&args[0].to_string()) {
        Ok(parsed) => json_to_value(&parsed),
        Err(err) => fail("json.parse", err),
    }
}

fn json_stringify(_: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "json.stringify") {
        return err;
    }
    match value_to_json(&args[0]) {
        Some(json) => Value::string(json.to_string()),
        None => fail("json.stringify", "value cannot be represented as JSON"),
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::none(),
        serde_json::Value::Bool(b) => Value::bool(*b),
        serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(fields) => {
            let mut entries = IndexMap::new();
            for (key, value) in fields {
                entries.insert(key.clone(), json_to_value(value));
            }
            Value::map(entries)
        }
    }
}

fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    match &*value.0 {
        ValueKind::None => Some(serde_json::Value::Null),
        ValueKind::Bool(b) => Some(serde_json::Value::Bool(*b)),
        ValueKind::Number(n) => {
            if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
                Some(serde_json::Value::from(*n as i64))
            } else {
                serde_json::Number::from_f64(*n).map(serde_json::Value::Number)
            }
        }
        ValueKind::String(s) => Some(serde_json::Value::String(s.clone())),
        ValueKind::List(items) => {
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                array.push(value_to_json(item)?);
            }
            Some(serde_json::Value::Array(array))
        }
        ValueKind::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (key, item) in entries {
                object.insert(key.clone(), value_to_json(item)?);
            }
            Some(serde_json::Value::Object(object))
        }
        _ => None,
    }
}

fn random_int(host: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 2, "random.int") {
        return err;
    }
    let low = match int_at(args, 0, "random.int") {
        Ok(n) => n,
        Err(err) => return err,
    };
    let high = match int_at(args, 1, "random.int") {
        Ok(n) => n,
        Err(err) => return err,
    };
    if low > high {
        return fail("random.int", "lower bound exceeds upper bound");
    }
    Value::number(host.rng.gen_range(low..=high) as f64)
}

fn random_float(host: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "random.float") {
        Ok(()) => Value::number(host.rng.gen::<f64>()),
        Err(err) => err,
    }
}

fn random_choice(host: &mut HostState, args: &[Value]) -> Value {
    if let Err(err) = arity(args, 1, "random.choice") {
        return err;
    }
    let items = match list_at(args, 0, "random.choice") {
        Ok(items) => items,
        Err(err) => return err,
    };
    if items.is_empty() {
        return fail("random.choice", "expects a non-empty list");
    }
    let idx = host.rng.gen_range(0..items.len());
    items[idx].clone()
}

fn random_bool(host: &mut HostState, args: &[Value]) -> Value {
    match arity(args, 0, "random.bool") {
        Ok(()) => Value::bool(host.rng.gen::<bool>()),
        Err(err) => err,
    }
}
