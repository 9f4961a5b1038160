//! Turns whatever the generation endpoint answered with into one image
//! reference: a data URL for binary bodies, the best string found in a JSON
//! document, or a URL / data string sent as plain text.

use crate::{
    error::ResolutionError,
    models::is_image_reference,
    studio::image_client::RawResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

/// Keys searched, in this order, before any other value of an object.
pub const PRIORITY_KEYS: [&str; 6] = ["image", "img", "url", "output", "result", "data"];

pub fn resolve(response: &RawResponse) -> Result<String, ResolutionError> {
    if let Some(mime) = image_mime(response.content_type.as_deref()) {
        if response.body.is_empty() {
            return Err(ResolutionError::EmptyBody);
        }
        return Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&response.body)));
    }

    let text = String::from_utf8_lossy(&response.body);
    match serde_json::from_str::<Value>(&text) {
        Ok(document) => find_reference(&document).ok_or(ResolutionError::NoImageInPayload),
        Err(_) => {
            let candidate = text.trim();
            if is_image_reference(candidate) {
                Ok(candidate.to_string())
            } else {
                Err(ResolutionError::UnexpectedFormat)
            }
        }
    }
}

/// Lowercased mime essence when the content type declares an image.
fn image_mime(content_type: Option<&str>) -> Option<String> {
    let essence = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    essence.starts_with("image/").then_some(essence)
}

/// First string in the document, preferring ones shaped like an image
/// reference. Both passes walk the document in the same order.
pub fn find_reference(document: &Value) -> Option<String> {
    first_string(document, &|s: &str| is_image_reference(s))
        .or_else(|| first_string(document, &|_: &str| true))
        .map(String::from)
}

fn first_string<'a>(node: &'a Value, accept: &dyn Fn(&str) -> bool) -> Option<&'a str> {
    match node {
        Value::String(s) => (!s.is_empty() && accept(s)).then_some(s.as_str()),
        Value::Array(items) => items.iter().find_map(|item| first_string(item, accept)),
        Value::Object(map) => PRIORITY_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|value| first_string(value, accept))
            .or_else(|| {
                map.iter()
                    .filter(|(key, _)| !PRIORITY_KEYS.contains(&key.as_str()))
                    .find_map(|(_, value)| first_string(value, accept))
            }),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}
