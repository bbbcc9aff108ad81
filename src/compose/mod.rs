/// Per-clip effect chains.
pub mod effect;
/// Layer blend operators and the layer fold.
pub mod mixture;
