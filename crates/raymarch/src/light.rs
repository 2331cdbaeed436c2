//! Directional light parameters for the fractal pass.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightData {
    pub intensity: f32,
    /// Linear color.
    pub color: Vec3,
    /// Direction the light travels, world space.
    pub direction: Vec3,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            color: Vec3::ONE,
            direction: Vec3::NEG_Y,
        }
    }
}

/// Publishes light parameters only when they differ from the last published
/// value.
///
/// Unlike shape edits, lights are deduplicated by value: the host polls every
/// frame and an unchanged light must not rewrite uniforms.
#[derive(Debug, Default)]
pub struct LightSource {
    current: Option<LightData>,
}

impl LightSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(data)` if `data` is new. The first poll always publishes.
    pub fn poll(&mut self, data: LightData) -> Option<LightData> {
        if !self.is_new(data) {
            return None;
        }
        self.commit(data);
        Some(data)
    }

    /// Whether `data` differs from the last committed value.
    #[must_use]
    pub fn is_new(&self, data: LightData) -> bool {
        self.current != Some(data)
    }

    /// Records `data` as published. Call once every consumer has it.
    pub fn commit(&mut self, data: LightData) {
        self.current = Some(data);
    }

    #[must_use]
    pub fn current(&self) -> Option<LightData> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_first_and_changed_values_only() {
        let mut source = LightSource::new();
        let light = LightData::default();
        assert_eq!(source.poll(light), Some(light));
        assert_eq!(source.poll(light), None);

        let dimmer = LightData {
            intensity: 0.5,
            ..light
        };
        assert_eq!(source.poll(dimmer), Some(dimmer));
        assert_eq!(source.current(), Some(dimmer));
    }

    #[test]
    fn uncommitted_light_stays_new() {
        let mut source = LightSource::new();
        let light = LightData::default();
        assert!(source.is_new(light));
        assert!(source.is_new(light), "checking does not publish");
        source.commit(light);
        assert!(!source.is_new(light));
    }
}
