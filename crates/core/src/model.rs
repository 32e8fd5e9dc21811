use std::fmt;

use serde::{Deserialize, Serialize};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// A model installed on the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub human_size: String,
    pub raw_size_bytes: u64,
    pub modified_at: String,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, raw_size_bytes: u64, modified_at: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            human_size: format_size(raw_size_bytes),
            raw_size_bytes,
            modified_at: modified_at.into(),
        }
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.human_size)
    }
}

/// Renders a byte count as `"4.1 GB"`; anything under 1 KiB stays an integer.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

/// Picks `preferred` when it is installed, otherwise the first model.
///
/// `models` is expected in registry order (sorted by name).
pub fn default_model<'a>(models: &'a [ModelDescriptor], preferred: Option<&str>) -> Option<&'a ModelDescriptor> {
    preferred
        .and_then(|p| models.iter().find(|m| m.name == p))
        .or_else(|| models.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sizes_are_whole_bytes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn sizes_step_through_units() {
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3_826_793_677), "3.6 GB");
        assert_eq!(format_size(2 * 1024u64.pow(4)), "2.0 TB");
    }

    #[test]
    fn terabytes_is_the_last_unit() {
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.0 TB");
    }

    #[test]
    fn human_size_converts_back_within_rounding() {
        let samples = [
            1024u64,
            1025,
            4_096,
            999_999,
            1_048_575,
            1_048_576,
            123_456_789,
            4_109_853_696,
            7_365_960_935,
            1u64 << 40,
            (1u64 << 40) * 3 + 12345,
        ];
        for raw in samples {
            let text = format_size(raw);
            let (num, unit) = text.split_once(' ').unwrap();
            let k = UNITS.iter().position(|u| *u == unit).unwrap();
            assert!(k >= 1, "{raw} rendered as {text}");
            let scale = 1024f64.powi(k as i32);
            let back = num.parse::<f64>().unwrap() * scale;
            assert!(
                (back - raw as f64).abs() <= 0.05 * scale + f64::EPSILON * raw as f64,
                "{raw} -> {text} -> {back}"
            );
        }
    }

    #[test]
    fn display_is_name_and_size() {
        let m = ModelDescriptor::new("llama3:8b", 4_661_224_676, "2024-05-01T10:00:00Z");
        assert_eq!(m.to_string(), "llama3:8b (4.3 GB)");
    }

    #[test]
    fn default_model_prefers_installed_choice() {
        let models = vec![
            ModelDescriptor::new("gemma:2b", 1, "t"),
            ModelDescriptor::new("mistral:7b", 1, "t"),
        ];
        assert_eq!(default_model(&models, Some("mistral:7b")).unwrap().name, "mistral:7b");
        assert_eq!(default_model(&models, Some("missing")).unwrap().name, "gemma:2b");
        assert_eq!(default_model(&models, None).unwrap().name, "gemma:2b");
        assert!(default_model(&[], Some("gemma:2b")).is_none());
    }
}
