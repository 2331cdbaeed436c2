//! Ungated fractal pass.
//!
//! The fractal kernel has no scene buffer to watch, so [`FractalRenderer`]
//! dispatches every frame. Light uniforms are only rewritten when the
//! [`LightSource`] reports a new value.

use compute::layout::{Slot, UniformField};
use compute::{ComputeBackend, ImageId, KernelLayout, UniformValue};
use glam::Vec3;
use tracing::{debug, trace};

use crate::camera::CameraProvider;
use crate::error::RenderError;
use crate::light::{LightData, LightSource};
use crate::raymarcher::{RayMarchConfig, CAMERA_INVERSE_PROJECTION, CAMERA_TO_WORLD, RESULT};

/// Binding table of the fractal kernel.
pub static FRACTAL_LAYOUT: KernelLayout = KernelLayout {
    label: "fractal",
    entry_point: "main",
    buffers: &[],
    images: &[Slot {
        name: RESULT,
        binding: 2,
    }],
    uniform_binding: 1,
    uniform_size: 192,
    uniforms: &[
        UniformField {
            name: CAMERA_TO_WORLD,
            offset: 0,
            size: 64,
        },
        UniformField {
            name: CAMERA_INVERSE_PROJECTION,
            offset: 64,
            size: 64,
        },
        UniformField {
            name: "Power",
            offset: 128,
            size: 4,
        },
        UniformField {
            name: "Darkness",
            offset: 132,
            size: 4,
        },
        UniformField {
            name: "BlackAndWhite",
            offset: 136,
            size: 4,
        },
        UniformField {
            name: "LightIntensity",
            offset: 140,
            size: 4,
        },
        UniformField {
            name: "ColorMix",
            offset: 144,
            size: 12,
        },
        UniformField {
            name: "LightColor",
            offset: 160,
            size: 12,
        },
        UniformField {
            name: "LightDirection",
            offset: 176,
            size: 12,
        },
    ],
};

/// Authoring parameters of the fractal. Setters clamp to the authoring
/// ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalSettings {
    power: f32,
    darkness: f32,
    black_and_white: f32,
    color_mix: Vec3,
}

impl Default for FractalSettings {
    fn default() -> Self {
        Self {
            power: 8.0,
            darkness: 70.0,
            black_and_white: 0.5,
            color_mix: Vec3::ZERO,
        }
    }
}

impl FractalSettings {
    pub const POWER_RANGE: (f32, f32) = (2.0, 32.0);
    pub const DARKNESS_RANGE: (f32, f32) = (2.0, 100.0);

    #[must_use]
    pub fn power(&self) -> f32 {
        self.power
    }

    pub fn set_power(&mut self, power: f32) {
        self.power = power.clamp(Self::POWER_RANGE.0, Self::POWER_RANGE.1);
    }

    #[must_use]
    pub fn darkness(&self) -> f32 {
        self.darkness
    }

    pub fn set_darkness(&mut self, darkness: f32) {
        self.darkness = darkness.clamp(Self::DARKNESS_RANGE.0, Self::DARKNESS_RANGE.1);
    }

    #[must_use]
    pub fn black_and_white(&self) -> f32 {
        self.black_and_white
    }

    pub fn set_black_and_white(&mut self, amount: f32) {
        self.black_and_white = amount.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn color_mix(&self) -> Vec3 {
        self.color_mix
    }

    pub fn set_color_mix(&mut self, color: Vec3) {
        self.color_mix = color;
    }
}

pub struct FractalRenderer<B: ComputeBackend> {
    backend: B,
    target: ImageId,
    workgroups: [u32; 3],
    settings: FractalSettings,
    light: LightSource,
    dispatches: u64,
    light_updates: u64,
}

impl<B: ComputeBackend> FractalRenderer<B> {
    pub fn new(mut backend: B, target: ImageId, config: RayMarchConfig) -> Result<Self, RenderError> {
        config.check()?;
        backend.bind_image(RESULT, target)?;
        Ok(Self {
            backend,
            target,
            workgroups: config.workgroups(),
            settings: FractalSettings::default(),
            light: LightSource::new(),
            dispatches: 0,
            light_updates: 0,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &FractalSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut FractalSettings {
        &mut self.settings
    }

    /// Dispatches the fractal kernel and copies the result to `destination`.
    pub fn render_frame(
        &mut self,
        camera: &impl CameraProvider,
        light: LightData,
        destination: ImageId,
    ) -> Result<(), RenderError> {
        if self.light.is_new(light) {
            self.backend
                .set_uniform("LightIntensity", UniformValue::Float(light.intensity))?;
            self.backend
                .set_uniform("LightColor", UniformValue::Vec3(light.color.to_array()))?;
            self.backend.set_uniform(
                "LightDirection",
                UniformValue::Vec3(light.direction.to_array()),
            )?;
            self.light.commit(light);
            self.light_updates += 1;
            debug!(intensity = light.intensity, "light uniforms updated");
        }

        let settings = self.settings;
        self.backend.set_uniform(
            CAMERA_TO_WORLD,
            UniformValue::Mat4(camera.camera_to_world().to_cols_array_2d()),
        )?;
        self.backend.set_uniform(
            CAMERA_INVERSE_PROJECTION,
            UniformValue::Mat4(camera.inverse_projection().to_cols_array_2d()),
        )?;
        self.backend
            .set_uniform("Power", UniformValue::Float(settings.power))?;
        self.backend
            .set_uniform("Darkness", UniformValue::Float(settings.darkness))?;
        self.backend
            .set_uniform("BlackAndWhite", UniformValue::Float(settings.black_and_white))?;
        self.backend
            .set_uniform("ColorMix", UniformValue::Vec3(settings.color_mix.to_array()))?;

        self.backend.dispatch(self.workgroups)?;
        self.backend.blit(self.target, destination)?;
        self.dispatches += 1;
        trace!(dispatches = self.dispatches, "fractal frame dispatched");
        Ok(())
    }

    #[must_use]
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    #[must_use]
    pub fn light_updates(&self) -> u64 {
        self.light_updates
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
