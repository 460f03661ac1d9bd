pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Input from `--input`, else piped stdin; `None` when neither is given.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Some(file::read_json(path)?));
    }
    match stdin::read_stdin()? {
        Some(data) => Ok(Some(serde_json::from_value(data)?)),
        None => Ok(None),
    }
}

/// Like [`read_input`], for commands without inline flags.
pub fn require_input<T: DeserializeOwned>(path: Option<&str>, command: &str) -> Result<T, Box<dyn std::error::Error>> {
    read_input(path)?.ok_or_else(|| format!("{command} requires --input <file.json> or JSON on stdin").into())
}
