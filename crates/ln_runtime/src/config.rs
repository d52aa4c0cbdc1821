//! VM configuration and result types.

/// Outcome of running a unit of code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// VM configuration options.
#[derive(Clone, Copy, Debug)]
pub struct VmConfig {
    /// Operand stack capacity in slots.
    pub stack_max: usize,
    /// Frames reserved up front; the frame stack grows past this on demand.
    pub initial_frames: usize,
    /// Bytes allocated before the first collection.
    pub initial_gc_threshold: usize,
    /// After a collection the next one triggers at live bytes times this.
    pub gc_grow_factor: usize,
    /// Collect before every allocation.
    pub stress_gc: bool,
    /// Print runtime errors and their stack trace to stderr.
    pub print_errors: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_max: 64 * 256,
            initial_frames: 4,
            initial_gc_threshold: 1024 * 1024,
            gc_grow_factor: 2,
            stress_gc: false,
            print_errors: true,
        }
    }
}

impl VmConfig {
    /// Defaults overridden by `LN_STRESS_GC=1` and `LN_QUIET_ERRORS=1`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if env_flag("LN_STRESS_GC") {
            config.stress_gc = true;
        }
        if env_flag("LN_QUIET_ERRORS") {
            config.print_errors = false;
        }
        config
    }

    pub fn quiet() -> Self {
        Self {
            print_errors: false,
            ..Self::default()
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = VmConfig::default();
        assert_eq!(c.stack_max, 16384);
        assert_eq!(c.initial_gc_threshold, 1 << 20);
        assert_eq!(c.gc_grow_factor, 2);
        assert!(!c.stress_gc);
        assert!(c.print_errors);
        assert!(!VmConfig::quiet().print_errors);
    }
}
