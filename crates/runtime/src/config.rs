use anyhow::{Context, Result};

/// Frame driver settings, read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Frames driven through the ray marching gate (`RAYMARCH_FRAMES`).
    pub frames: u32,
    /// Output width in pixels (`RAYMARCH_WIDTH`).
    pub width: u32,
    /// Output height in pixels (`RAYMARCH_HEIGHT`).
    pub height: u32,
    /// Frames of the ungated fractal pass (`RAYMARCH_FRACTAL_FRAMES`).
    pub fractal_frames: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frames: 60,
            width: 1280,
            height: 720,
            fractal_frames: 3,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let read = |key: &str, default: u32| -> Result<u32> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be an unsigned integer, got {raw:?}")),
            }
        };

        let config = Self {
            frames: read("RAYMARCH_FRAMES", defaults.frames)?,
            width: read("RAYMARCH_WIDTH", defaults.width)?,
            height: read("RAYMARCH_HEIGHT", defaults.height)?,
            fractal_frames: read("RAYMARCH_FRACTAL_FRAMES", defaults.fractal_frames)?,
        };
        anyhow::ensure!(
            config.width > 0 && config.height > 0,
            "output size must be non-zero, got {}x{}",
            config.width,
            config.height
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn keys_override_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("RAYMARCH_FRAMES", "12"),
            ("RAYMARCH_WIDTH", " 640 "),
            ("RAYMARCH_HEIGHT", "480"),
        ]))
        .unwrap();
        assert_eq!(config.frames, 12);
        assert_eq!((config.width, config.height), (640, 480));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = RuntimeConfig::from_lookup(lookup(&[("RAYMARCH_FRAMES", "many")])).unwrap_err();
        assert!(err.to_string().contains("RAYMARCH_FRAMES"));
        assert!(RuntimeConfig::from_lookup(lookup(&[("RAYMARCH_WIDTH", "0")])).is_err());
    }
}
