/// Initialization parameters for [`super::WgpuDriver::request`].
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct DriverInit {
    /// Adapter preference (integrated vs discrete).
    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Only accept a software (fallback) adapter.
    pub force_fallback_adapter: bool,

    /// Format of the color targets programs render into.
    ///
    /// Must match the view passed to `WgpuDriver::encode`.
    pub color_format: wgpu::TextureFormat,
}

impl Default for DriverInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            force_fallback_adapter: false,
            color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }
}
