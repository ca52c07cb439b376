//! # Bootstrap Probe
//!
//! Reads subsystem health out of the start script's console output.
//!
//! The script prints a status table with fixed markers. All matching against
//! that text lives here.

/// Printed next to a subsystem that failed to start
pub const INACTIVE_MARKER: &str = "❌ INACTIVO";

/// Printed when no camera is attached
pub const NO_CAMERA_MARKER: &str = "Cámara no detectada";

/// Printed when the control server is listening (two spaces before the icon)
pub const CONTROL_ACTIVE_MARKER: &str = "Servidor de control:  ✅ ACTIVO";

/// Health of the robot's servers after the start script ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Motion control may proceed
    pub control_active: bool,
    /// Video is available; when false the session runs control-only
    pub camera_available: bool,
}

/// Classify start-script output.
///
/// # Examples
///
/// ```
/// use rover_link::remote::probe::interpret;
///
/// let report = interpret("Servidor de control:  ✅ ACTIVO\nCámara: ✅ ACTIVO\n");
/// assert!(report.control_active);
/// assert!(report.camera_available);
/// ```
pub fn interpret(output: &str) -> BootstrapReport {
    let camera_inactive = output.contains(INACTIVE_MARKER) || output.contains(NO_CAMERA_MARKER);
    BootstrapReport {
        control_active: output.contains(CONTROL_ACTIVE_MARKER),
        camera_available: !camera_inactive,
    }
}
