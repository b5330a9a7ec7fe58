//! Pipeline configuration.

/// Switches for the optimizing pipeline.
///
/// # Example
///
/// ```rust
/// use sysmir::compiler::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_inline_threshold(Some(64))
///     .with_parallel(true);
/// assert!(config.optimize);
/// assert_eq!(config.max_dce_iterations, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run the mid-end at all. When off, only the CFG is built (which checks
    /// that every jump was resolved) and the module is emitted as lowered.
    pub optimize: bool,
    /// Inline calls to non-recursive functions.
    pub inline: bool,
    /// Remove unreachable blocks and unused instructions.
    pub dead_code: bool,
    /// Promote stack slots to SSA values.
    pub mem2reg: bool,
    /// Only inline callees with at most this many instructions.
    pub inline_threshold: Option<usize>,
    /// Upper bound on dead-code sweeps per function.
    pub max_dce_iterations: usize,
    /// Run function-local phases on several functions in parallel.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            inline: true,
            dead_code: true,
            mem2reg: true,
            inline_threshold: None,
            max_dce_iterations: 100,
            parallel: false,
        }
    }
}

impl PipelineConfig {
    /// Configuration that skips the mid-end.
    #[must_use]
    pub fn unoptimized() -> Self {
        Self::default().with_optimize(false)
    }

    /// Sets [`PipelineConfig::optimize`].
    #[must_use]
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Sets [`PipelineConfig::inline`].
    #[must_use]
    pub fn with_inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Sets [`PipelineConfig::dead_code`].
    #[must_use]
    pub fn with_dead_code(mut self, dead_code: bool) -> Self {
        self.dead_code = dead_code;
        self
    }

    /// Sets [`PipelineConfig::mem2reg`].
    #[must_use]
    pub fn with_mem2reg(mut self, mem2reg: bool) -> Self {
        self.mem2reg = mem2reg;
        self
    }

    /// Sets [`PipelineConfig::inline_threshold`].
    #[must_use]
    pub fn with_inline_threshold(mut self, threshold: Option<usize>) -> Self {
        self.inline_threshold = threshold;
        self
    }

    /// Sets [`PipelineConfig::max_dce_iterations`].
    #[must_use]
    pub fn with_max_dce_iterations(mut self, iterations: usize) -> Self {
        self.max_dce_iterations = iterations;
        self
    }

    /// Sets [`PipelineConfig::parallel`].
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
