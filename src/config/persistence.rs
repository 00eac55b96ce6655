//! Arguments file loading: JSON (wrapped or plain) and `key=value` formats.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::types::InvocationParameters;

/// Key under which automation frameworks wrap module arguments.
const WRAPPED_ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";
/// Framework-internal arguments injected alongside the module's own.
const INTERNAL_ARG_PREFIX: &str = "_ansible_";

pub fn load_params(path: &Path) -> Result<InvocationParameters> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read arguments file: {:?}", path))?;

    let params = parse_params(&content)
        .with_context(|| format!("Failed to parse arguments file: {:?}", path))?;

    info!("Loaded parameters from: {:?}", path);
    Ok(params)
}

/// Parse module arguments from a JSON document or `key=value` pairs.
pub fn parse_params(content: &str) -> Result<InvocationParameters> {
    let trimmed = content.trim();
    let mut args = if trimmed.starts_with('{') {
        let json: Value = serde_json::from_str(trimmed)?;
        match json {
            Value::Object(mut map) => match map.remove(WRAPPED_ARGS_KEY) {
                Some(Value::Object(inner)) => inner,
                Some(_) => bail!("{} must be an object", WRAPPED_ARGS_KEY),
                None => map,
            },
            _ => bail!("arguments must be a JSON object"),
        }
    } else {
        parse_key_values(trimmed)?
    };

    args.retain(|key, _| {
        let internal = key.starts_with(INTERNAL_ARG_PREFIX);
        if internal {
            debug!("Ignoring framework argument: {}", key);
        }
        !internal
    });

    // Null means "not given" for every optional field.
    args.retain(|_, value| !value.is_null());

    Ok(serde_json::from_value(Value::Object(args))?)
}

/// Split `key=value` pairs with shell quoting rules.
fn parse_key_values(content: &str) -> Result<Map<String, Value>> {
    let tokens = shell_words::split(content)
        .context("could not parse key=value arguments")?;

    let mut map = Map::new();
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got {:?}", token))?;
        if key.is_empty() {
            bail!("empty key in {:?}", token);
        }
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(map)
}
