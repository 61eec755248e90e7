/// Tokens of typical formulas fit into this many slots without a heap allocation.
pub const N_TOKENS_ON_STACK: usize = 32;
/// Maximal nesting of groups, vectors, and operators the parser accepts.
pub const MAX_PARSE_DEPTH: usize = 512;

/// Reserved name that is bound to the result of the latest top-level evaluation.
pub const ANS: &str = "ans";
