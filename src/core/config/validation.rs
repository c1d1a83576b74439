use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 1, 100_000)?;
        validate_u64_field(rag, "rag.chunk_overlap", "chunk_overlap", 0, 99_999)?;
        validate_u64_field(
            rag,
            "rag.min_document_chars",
            "min_document_chars",
            0,
            1_000_000,
        )?;
        validate_u64_field(rag, "rag.index_batch_size", "index_batch_size", 1, 1_000)?;
        validate_u64_field(
            rag,
            "rag.index_batch_delay_ms",
            "index_batch_delay_ms",
            0,
            600_000,
        )?;
        validate_u64_field(
            rag,
            "rag.rebuild_batch_size",
            "rebuild_batch_size",
            1,
            10_000,
        )?;
        validate_u64_field(rag, "rag.startup_delay_ms", "startup_delay_ms", 0, 600_000)?;
        validate_u64_field(rag, "rag.global_top_k", "global_top_k", 1, 100)?;
        validate_u64_field(rag, "rag.scoped_candidates", "scoped_candidates", 1, 1_000)?;
        validate_u64_field(rag, "rag.scoped_top_k", "scoped_top_k", 1, 100)?;
        validate_u64_field(
            rag,
            "rag.max_context_chars",
            "max_context_chars",
            1,
            1_000_000,
        )?;
        validate_u64_field(rag, "rag.answer_attempts", "answer_attempts", 1, 10)?;
        validate_u64_field(
            rag,
            "rag.answer_retry_delay_ms",
            "answer_retry_delay_ms",
            0,
            600_000,
        )?;

        let size = rag.get("chunk_size").and_then(|v| v.as_u64());
        let overlap = rag.get("chunk_overlap").and_then(|v| v.as_u64());
        if let (Some(size), Some(overlap)) = (size, overlap) {
            if overlap >= size {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'rag.chunk_overlap': must be smaller than rag.chunk_size"
                        .to_string(),
                ));
            }
        }
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
        validate_u64_field(embedding, "embedding.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_u64_field(
            embedding,
            "embedding.query_timeout_secs",
            "query_timeout_secs",
            1,
            3_600,
        )?;
    }

    if let Some(completion) = expect_optional_object(root, "completion")? {
        validate_optional_string_field(completion, "completion.base_url", "base_url")?;
        validate_optional_string_field(completion, "completion.model", "model")?;
        validate_optional_string_field(completion, "completion.api_key", "api_key")?;
        validate_u64_field(completion, "completion.max_tokens", "max_tokens", 1, 100_000)?;
        validate_f64_field(completion, "completion.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(
            completion,
            "completion.timeout_secs",
            "timeout_secs",
            1,
            3_600,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
