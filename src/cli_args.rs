use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};

/// Value of `--name=value` or `--name value`; blank values are ignored.
pub fn arg_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    find_arg(&args, name)
}

pub fn arg_path(name: &str) -> Option<PathBuf> {
    arg_value(name).map(PathBuf::from)
}

pub fn arg_parsed<T: FromStr>(name: &str) -> Result<Option<T>> {
    arg_value(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| anyhow!("invalid value for --{name}: {raw:?}"))
        })
        .transpose()
}

pub fn has_flag(name: &str) -> bool {
    let flag = format!("--{name}");
    std::env::args().skip(1).any(|arg| arg == flag)
}

fn find_arg(args: &[String], name: &str) -> Option<String> {
    let flag = format!("--{name}");
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn both_spellings_are_accepted() {
        let a = args(&["--race=202305040911", "--db", "out/x.sqlite"]);
        assert_eq!(find_arg(&a, "race").as_deref(), Some("202305040911"));
        assert_eq!(find_arg(&a, "db").as_deref(), Some("out/x.sqlite"));
        assert_eq!(find_arg(&a, "xlsx"), None);
    }

    #[test]
    fn dangling_flag_has_no_value() {
        let a = args(&["--db", "--race=1"]);
        assert_eq!(find_arg(&a, "db"), None);
        let a = args(&["--db="]);
        assert_eq!(find_arg(&a, "db"), None);
    }
}
