use crate::{GatewayConfig, IngestItem, MediaError, MediaResult};

/// Batch-level limits, checked before any item is looked at
pub fn validate_batch(config: &GatewayConfig, count: usize) -> MediaResult<()> {
    if count > config.max_files_per_batch {
        return Err(MediaError::validation(format!(
            "Too many files: {} (max {})",
            count, config.max_files_per_batch
        )));
    }
    Ok(())
}

/// Per-item type and size checks. Runs before any store call.
pub fn validate_item(config: &GatewayConfig, item: &IngestItem) -> MediaResult<()> {
    if !config.allows(&item.declared_mime_type) {
        return Err(MediaError::validation(format!(
            "Unsupported content type {:?}; only images are allowed",
            item.declared_mime_type
        )));
    }

    let actual = item.content.len() as u64;
    let largest = item.size_bytes.max(actual);
    if largest > config.max_file_bytes {
        return Err(MediaError::validation(format!(
            "File too large: {} bytes (max {})",
            largest, config.max_file_bytes
        )));
    }

    if item.original_name.trim().is_empty() {
        return Err(MediaError::validation("Missing original file name"));
    }

    Ok(())
}
