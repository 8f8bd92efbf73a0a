use crate::error::ExtractError;

/// Text of every page, in page order.
pub(super) fn extract(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed font tables.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| parse_error("PDF parser aborted"))?;

    let text = result.map_err(|e| parse_error(&e.to_string()))?;
    Ok(text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn parse_error(message: &str) -> ExtractError {
    ExtractError::Parse {
        format: "pdf".to_string(),
        message: message.to_string(),
    }
}
