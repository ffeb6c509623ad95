//! Presentation collaborator port.

use crate::domain::indicator::IndicatorSnapshot;

/// Outbound, fire-and-forget: implementations must not block and never report
/// back.
pub trait PresentationPort: Send + Sync {
    fn publish(&self, snapshot: &IndicatorSnapshot);
}
