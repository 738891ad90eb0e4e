// Adapters and presentation: concrete record sources and the tier → color mapping.

pub mod presentation;
pub mod sources;
