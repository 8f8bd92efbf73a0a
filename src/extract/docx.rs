use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

static RE_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").unwrap());
static RE_TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").unwrap());
static RE_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6});").unwrap()
});

/// Non-empty paragraphs of the main document part, one per line.
pub(super) fn extract(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(parse_error)?;
    let mut part = archive.by_name(DOCUMENT_PART).map_err(parse_error)?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| ExtractError::Parse {
            format: "docx".to_string(),
            message: e.to_string(),
        })?;

    Ok(paragraphs(&xml).join("\n"))
}

fn paragraphs(xml: &str) -> Vec<String> {
    RE_PARAGRAPH
        .find_iter(xml)
        .map(|paragraph| {
            RE_TEXT_RUN
                .captures_iter(paragraph.as_str())
                .filter_map(|run| run.get(1))
                .map(|text| unescape(text.as_str()))
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Decode the predefined XML entities and numeric character references in one pass.
fn unescape(text: &str) -> String {
    RE_ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => {
                    let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn parse_error(error: zip::result::ZipError) -> ExtractError {
    ExtractError::Parse {
        format: "docx".to_string(),
        message: error.to_string(),
    }
}
