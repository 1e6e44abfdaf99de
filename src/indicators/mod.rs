// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free derivations over a close series. Insufficient history
// is reported as `None` per entry, never as an error.

pub mod bollinger;
