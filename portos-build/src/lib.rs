// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

// Pre-build code for the portos crate.

// The kernel layer has a handful of compile-time tunables: pool capacities, the size of the inline
// thread argument buffer, the tick rate, and the longest wait a native kernel call accepts.  These
// come from a `.config`-style file (named by `PORTOS_CONFIG`) and/or from individual `PORTOS_*`
// environment variables.  The result is written as a module of constants into `OUT_DIR/config.rs`
// which the library pulls in with `include!`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;

/// The Rust type a setting is emitted as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Usize,
    U32,
    I64,
}

impl Kind {
    fn rust_type(self) -> &'static str {
        match self {
            Kind::Usize => "usize",
            Kind::U32 => "u32",
            Kind::I64 => "i64",
        }
    }
}

struct Setting {
    name: &'static str,
    kind: Kind,
    default: &'static str,
    doc: &'static str,
}

const SETTINGS: &[Setting] = &[
    Setting {
        name: "MAX_THREADS",
        kind: Kind::Usize,
        default: "8",
        doc: "Number of threads that may exist at once (capacity of the thread data pool).",
    },
    Setting {
        name: "MAX_THREAD_ARGUMENT_SIZE",
        kind: Kind::Usize,
        default: "64",
        doc: "Bytes of inline storage for the callable a thread runs.",
    },
    Setting {
        name: "SYSTICK_HZ",
        kind: Kind::I64,
        default: "1000",
        doc: "Frequency of the kernel tick counter read by the system clock.",
    },
    Setting {
        name: "MAX_WAIT_MS",
        kind: Kind::U32,
        default: "0xFFFE",
        doc: "Longest timeout, in milliseconds, passed to a single native wait.",
    },
    Setting {
        name: "CMSIS_MAX_MUTEXES",
        kind: Kind::Usize,
        default: "16",
        doc: "Mutex control blocks reserved for the CMSIS backend.",
    },
    Setting {
        name: "CMSIS_MAX_SEMAPHORES",
        kind: Kind::Usize,
        default: "32",
        doc: "Semaphore control blocks reserved for the CMSIS backend.",
    },
];

/// Export the configuration as a `config.rs` module in `OUT_DIR`.  This must be called from the
/// build script of any crate that `include!`s the generated file.
pub fn export_config() -> Result<()> {
    let outdir = env::var("OUT_DIR").context("OUT_DIR must be set")?;

    println!("cargo:rerun-if-env-changed=PORTOS_CONFIG");
    for setting in SETTINGS {
        println!("cargo:rerun-if-env-changed=PORTOS_{}", setting.name);
    }

    let mut values = BTreeMap::new();
    if let Ok(path) = env::var("PORTOS_CONFIG") {
        println!("cargo:rerun-if-changed={}", path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Unable to read config file {}", path))?;
        values = parse_config(&text)?;
    }
    for setting in SETTINGS {
        if let Ok(value) = env::var(format!("PORTOS_{}", setting.name)) {
            values.insert(setting.name.to_string(), value);
        }
    }

    let text = render(&values)?;
    let gen_path = Path::new(&outdir).join("config.rs");
    fs::write(&gen_path, text)
        .with_context(|| format!("Unable to write {}", gen_path.display()))?;
    Ok(())
}

/// Parse `PORTOS_NAME=value` lines.  Blank lines and `#` comments are skipped, anything else is an
/// error so that typos in the file do not silently fall back to defaults.
fn parse_config(text: &str) -> Result<BTreeMap<String, String>> {
    let entry = Regex::new(r"^PORTOS_([A-Z0-9_]+)=(\S+)$").unwrap();

    let mut values = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let caps = entry
            .captures(line)
            .ok_or_else(|| anyhow!("line {}: malformed entry {:?}", lineno + 1, line))?;
        if !SETTINGS.iter().any(|s| s.name == &caps[1]) {
            bail!("line {}: unknown setting PORTOS_{}", lineno + 1, &caps[1]);
        }
        values.insert(caps[1].to_string(), caps[2].to_string());
    }
    Ok(values)
}

/// Parse a value and check it against the kind of its setting.  Hex values are accepted for every
/// kind.
fn check_value(setting: &Setting, value: &str) -> Result<i128> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => value.parse::<i128>(),
    }
    .with_context(|| format!("PORTOS_{}: {:?} is not a number", setting.name, value))?;

    let fits = match setting.kind {
        Kind::Usize => parsed >= 0 && parsed <= u32::MAX as i128,
        Kind::U32 => parsed >= 0 && parsed <= u32::MAX as i128,
        Kind::I64 => parsed > 0 && parsed <= i64::MAX as i128,
    };
    if !fits {
        bail!("PORTOS_{}: {} is out of range for {}", setting.name, value, setting.kind.rust_type());
    }
    Ok(parsed)
}

fn render(values: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::new();
    for setting in SETTINGS {
        let value = values.get(setting.name).map(String::as_str).unwrap_or(setting.default);
        let value = check_value(setting, value)?;
        out.push_str(&format!("/// {}\n", setting.doc));
        out.push_str("#[allow(dead_code)]\n");
        out.push_str(&format!(
            "pub const {}: {} = {};\n",
            setting.name,
            setting.kind.rust_type(),
            value
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_comments() {
        let values = parse_config("# threads\n\nPORTOS_MAX_THREADS=4\nPORTOS_SYSTICK_HZ=100\n")
            .unwrap();
        assert_eq!(values.get("MAX_THREADS").map(String::as_str), Some("4"));
        assert_eq!(values.get("SYSTICK_HZ").map(String::as_str), Some("100"));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(parse_config("PORTOS_MAX_CHEESE=4\n").is_err());
        assert!(parse_config("MAX_THREADS 4\n").is_err());
    }

    #[test]
    fn render_defaults() {
        let text = render(&BTreeMap::new()).unwrap();
        assert!(text.contains("pub const MAX_THREADS: usize = 8;"));
        assert!(text.contains("pub const MAX_WAIT_MS: u32 = 65534;"));
        assert!(text.contains("pub const SYSTICK_HZ: i64 = 1000;"));
    }

    #[test]
    fn render_checks_range() {
        let mut values = BTreeMap::new();
        values.insert("SYSTICK_HZ".to_string(), "0".to_string());
        assert!(render(&values).is_err());
        values.insert("SYSTICK_HZ".to_string(), "0x8000".to_string());
        assert!(render(&values).unwrap().contains("pub const SYSTICK_HZ: i64 = 32768;"));
    }

    #[test]
    fn render_normalizes_numbers() {
        let mut values = BTreeMap::new();
        values.insert("MAX_THREADS".to_string(), "0X10".to_string());
        values.insert("SYSTICK_HZ".to_string(), "+100".to_string());
        values.insert("MAX_WAIT_MS".to_string(), "007".to_string());
        let text = render(&values).unwrap();
        assert!(text.contains("pub const MAX_THREADS: usize = 16;"));
        assert!(text.contains("pub const SYSTICK_HZ: i64 = 100;"));
        assert!(text.contains("pub const MAX_WAIT_MS: u32 = 7;"));
    }
}
