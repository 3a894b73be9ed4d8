//! Renderer and device-context configuration
//!
//! All tunables are explicit in-memory structs passed at construction time;
//! nothing is read from files or ambient globals. Validation-layer
//! enablement in particular is a field here rather than a compile-time or
//! environment toggle.

use std::path::PathBuf;

/// Number of frames the CPU may record ahead of the GPU by default
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Configuration for the frame renderer
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Number of frame slots cycled through (frames in flight), must be >= 1
    pub frames_in_flight: usize,
    /// Clear color applied when the render pass begins, RGBA
    pub clear_color: [f32; 4],
    /// Path of the compiled vertex shader blob
    pub vertex_shader_path: PathBuf,
    /// Path of the compiled fragment shader blob
    pub fragment_shader_path: PathBuf,
    /// Projection parameters for the per-frame uniform update
    pub projection: ProjectionConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vertex_shader_path: PathBuf::from("shaders/basic.vert.spv"),
            fragment_shader_path: PathBuf::from("shaders/basic.frag.spv"),
            projection: ProjectionConfig::default(),
        }
    }
}

/// Perspective projection parameters
///
/// The aspect ratio is not configured here; it is derived from the live
/// presentation surface extent every frame so window resizes are picked up
/// through recreation without touching the configuration.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionConfig {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Severity of a validation or debug message routed through a [`DebugReporter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Informational message
    Info,
    /// Non-fatal problem worth surfacing
    Warning,
    /// Specification violation or likely crash
    Error,
}

/// Capability interface for receiving validation-layer and debug messages
///
/// Injected through [`ContextConfig`] so alternate sinks (test collectors,
/// structured telemetry) can be substituted without touching the renderer.
pub trait DebugReporter {
    /// Deliver one message from the validation or debug machinery
    fn report(&self, severity: DebugSeverity, message: &str);
}

/// Default reporter that forwards messages to the `log` facade
#[derive(Debug, Default)]
pub struct LogReporter;

impl DebugReporter for LogReporter {
    fn report(&self, severity: DebugSeverity, message: &str) {
        match severity {
            DebugSeverity::Info => log::info!("[vulkan] {message}"),
            DebugSeverity::Warning => log::warn!("[vulkan] {message}"),
            DebugSeverity::Error => log::error!("[vulkan] {message}"),
        }
    }
}

/// Configuration for device-context construction
pub struct ContextConfig {
    /// Whether validation layers were requested at bootstrap
    pub enable_validation: bool,
    /// Sink for validation and debug messages
    pub debug_reporter: Box<dyn DebugReporter>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            debug_reporter: Box::new(LogReporter),
        }
    }
}

impl std::fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConfig")
            .field("enable_validation", &self.enable_validation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_engine_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            config.vertex_shader_path,
            PathBuf::from("shaders/basic.vert.spv")
        );
        assert_eq!(
            config.fragment_shader_path,
            PathBuf::from("shaders/basic.frag.spv")
        );
    }

    #[test]
    fn test_injected_reporter_receives_messages() {
        use std::cell::RefCell;

        struct Collector {
            messages: RefCell<Vec<(DebugSeverity, String)>>,
        }

        impl DebugReporter for Collector {
            fn report(&self, severity: DebugSeverity, message: &str) {
                self.messages
                    .borrow_mut()
                    .push((severity, message.to_string()));
            }
        }

        let collector = Collector {
            messages: RefCell::new(Vec::new()),
        };
        collector.report(DebugSeverity::Warning, "image layout mismatch");
        let messages = collector.messages.borrow();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, DebugSeverity::Warning);
    }

    #[test]
    fn test_default_projection() {
        let projection = ProjectionConfig::default();
        assert!((projection.fov_y_degrees - 45.0).abs() < f32::EPSILON);
        assert!((projection.near - 0.1).abs() < f32::EPSILON);
        assert!((projection.far - 1000.0).abs() < f32::EPSILON);
    }
}
