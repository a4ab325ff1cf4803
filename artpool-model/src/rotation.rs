use std::fmt;

/// How the next pool member is chosen for promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RotationPolicy {
    /// Walk members in a stable order using a persisted cursor.
    #[default]
    Sequential,
    /// Pick uniformly among non-snapshot members. No cursor is kept.
    Random,
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationPolicy::Sequential => write!(f, "sequential"),
            RotationPolicy::Random => write!(f, "random"),
        }
    }
}
