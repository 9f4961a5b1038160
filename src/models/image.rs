use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One generated image: where to find it, what produced it, and when it was
/// materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// `http(s)://` URL or `data:image/...;base64,...` string.
    #[serde(rename = "src", alias = "reference")]
    pub reference: String,
    pub prompt: String,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Stamps the record with the current time. The prompt is trimmed.
    pub fn new(reference: impl Into<String>, prompt: &str) -> Self {
        Self {
            reference: reference.into(),
            prompt: prompt.trim().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_embedded(&self) -> bool {
        is_data_image(&self.reference)
    }

    /// Splits an embedded reference into its mime type and decoded bytes.
    /// Returns `None` for URLs and for data strings that are not base64.
    pub fn decode_data(&self) -> Option<(String, Vec<u8>)> {
        if !self.is_embedded() {
            return None;
        }
        let rest = &self.reference["data:".len()..];
        let (header, payload) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        let bytes = STANDARD.decode(payload.trim()).ok()?;
        Some((mime.to_string(), bytes))
    }

    /// File extension matching the image type, `png` when unknown.
    pub fn file_extension(&self) -> &'static str {
        let mime = if self.is_embedded() {
            self.reference["data:".len()..]
                .split([';', ','])
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase()
        } else {
            let path = self.reference.split(['?', '#']).next().unwrap_or_default();
            match path.rsplit_once('.') {
                Some((_, ext)) => format!("image/{}", ext.to_ascii_lowercase()),
                None => String::new(),
            }
        };

        match mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/svg+xml" | "image/svg" => "svg",
            "image/bmp" => "bmp",
            _ => "png",
        }
    }

    /// `<prefix>-<n>.<ext>` where `n` is one-based.
    pub fn download_file_name(&self, prefix: &str, index: usize) -> String {
        format!("{}-{}.{}", prefix, index + 1, self.file_extension())
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

pub fn is_http_url(value: &str) -> bool {
    starts_with_ignore_case(value, "http://") || starts_with_ignore_case(value, "https://")
}

pub fn is_data_image(value: &str) -> bool {
    starts_with_ignore_case(value, "data:image/")
}

/// True when `value` can be used directly as an image source.
pub fn is_image_reference(value: &str) -> bool {
    is_http_url(value) || is_data_image(value)
}

/// Timestamps are stored as `2026-01-01T12:00:00.000Z`.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
