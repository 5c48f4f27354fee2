//! Input validation performed before any engine call.

use hyperlens_protocol::has_hyper_extension;
use serde_json::Value;
use std::path::Path;

use crate::error::DispatchError;

/// `path` must exist, be a directory and be listable.
pub fn readable_directory(path: &Path) -> Result<(), DispatchError> {
    if !path.exists() {
        return Err(DispatchError::invalid(format!(
            "Directory not found: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(DispatchError::invalid(format!(
            "Not a directory: {}",
            path.display()
        )));
    }
    std::fs::read_dir(path).map_err(|err| {
        DispatchError::invalid(format!(
            "Directory not readable: {}: {}",
            path.display(),
            err
        ))
    })?;
    Ok(())
}

/// `path` must be an existing regular file ending in `.hyper`.
pub fn hyper_file(path: &Path) -> Result<(), DispatchError> {
    if !path.exists() {
        return Err(DispatchError::invalid(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(DispatchError::invalid(format!(
            "Not a file: {}",
            path.display()
        )));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !has_hyper_extension(&name) {
        return Err(DispatchError::invalid(format!(
            "Not a .hyper file: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Parse a `--max-rows` style argument. Must be a positive integer.
pub fn max_rows_from_str(raw: &str) -> Result<u64, DispatchError> {
    let trimmed = raw.trim();
    match trimmed.parse::<i128>() {
        Ok(n) if n > 0 => u64::try_from(n)
            .map_err(|_| DispatchError::invalid(format!("maxRows is too large: {}", trimmed))),
        Ok(_) => Err(DispatchError::invalid(format!(
            "maxRows must be a positive integer, got {}",
            trimmed
        ))),
        Err(_) => Err(DispatchError::invalid(format!(
            "maxRows must be a positive integer, got '{}'",
            trimmed
        ))),
    }
}

/// Parse `maxRows` from a JSON body or query value. `null` means "no limit".
pub fn max_rows_from_json(raw: &Value) -> Result<Option<u64>, DispatchError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                return positive(n).map(Some);
            }
            if number.is_i64() {
                return Err(DispatchError::invalid(format!(
                    "maxRows must be a positive integer, got {}",
                    number
                )));
            }
            match number.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= 1.0 && f <= u64::MAX as f64 => {
                    Ok(Some(f as u64))
                }
                _ => Err(DispatchError::invalid(format!(
                    "maxRows must be a positive integer, got {}",
                    number
                ))),
            }
        }
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => max_rows_from_str(text).map(Some),
        other => Err(DispatchError::invalid(format!(
            "maxRows must be a positive integer, got {}",
            other
        ))),
    }
}

fn positive(n: u64) -> Result<u64, DispatchError> {
    if n == 0 {
        Err(DispatchError::invalid(
            "maxRows must be a positive integer, got 0",
        ))
    } else {
        Ok(n)
    }
}
