use derive_new::new;

/// Deepest chain regular repacking can emit (`--depth` is capped at 4095)
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 4096;

/// Bounds applied while resolving delta chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct DeltaLimits {
    /// Maximum number of delta links between a target and its plain base
    pub max_chain_depth: usize,
}

impl Default for DeltaLimits {
    fn default() -> Self {
        DeltaLimits {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}
