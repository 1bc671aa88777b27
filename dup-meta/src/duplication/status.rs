use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a duplication.
///
/// The serialized names match the names used in the blobs persisted in the meta store.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DuplicationStatus {
    /// Set when the duplication is first created and not yet started.
    #[serde(rename = "DS_INIT")]
    Init,

    /// The duplication ships writes to the remote cluster.
    #[serde(rename = "DS_START")]
    Start,

    /// The duplication is suspended by an administrator. Progress is kept.
    #[serde(rename = "DS_PAUSE")]
    Pause,

    /// The duplication is removed. This status is terminal.
    #[serde(rename = "DS_REMOVED")]
    Removed,
}

impl DuplicationStatus {
    /// Returns `true` if a duplication in this status is actively duplicating, i.e. it is
    /// visible to queries and to the sync driver.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Init => false,
            Self::Start => true,
            Self::Pause => true,
            Self::Removed => false,
        }
    }

    /// Returns `true` if no transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Removed)
    }

    /// Returns `true` if a duplication in this status may be altered to `to`.
    ///
    /// Staying in the same status is allowed for every non-terminal status, since it is how the
    /// fail mode is changed alone.
    pub fn can_transition_to(&self, to: DuplicationStatus) -> bool {
        match (self, to) {
            (Self::Removed, _) => false,
            (from, to) if *from == to => true,
            (Self::Init, Self::Start) => true,
            (Self::Start, Self::Pause | Self::Removed) => true,
            (Self::Pause, Self::Start | Self::Removed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DuplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Start => write!(f, "start"),
            Self::Pause => write!(f, "pause"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Policy applied when the remote cluster keeps failing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum FailMode {
    /// Tolerate lag and keep retrying.
    #[default]
    #[serde(rename = "FAIL_SLOW")]
    FailSlow,

    /// Surface remote errors immediately.
    #[serde(rename = "FAIL_FAST")]
    FailFast,
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailSlow => write!(f, "fail_slow"),
            Self::FailFast => write!(f, "fail_fast"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DuplicationStatus; 4] = [
        DuplicationStatus::Init,
        DuplicationStatus::Start,
        DuplicationStatus::Pause,
        DuplicationStatus::Removed,
    ];

    #[test]
    fn removed_has_no_outgoing_transition() {
        for to in ALL {
            assert!(!DuplicationStatus::Removed.can_transition_to(to));
        }
    }

    #[test]
    fn transition_table() {
        use DuplicationStatus::*;

        let allowed = [
            (Init, Init),
            (Init, Start),
            (Start, Start),
            (Start, Pause),
            (Start, Removed),
            (Pause, Pause),
            (Pause, Start),
            (Pause, Removed),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn only_start_and_pause_are_valid() {
        let valid: Vec<_> = ALL.into_iter().filter(|s| s.is_valid()).collect();
        assert_eq!(
            valid,
            vec![DuplicationStatus::Start, DuplicationStatus::Pause]
        );
    }

    #[test]
    fn serialized_names() {
        assert_eq!(
            serde_json::to_string(&DuplicationStatus::Start).unwrap(),
            "\"DS_START\""
        );
        assert_eq!(
            serde_json::to_string(&FailMode::FailFast).unwrap(),
            "\"FAIL_FAST\""
        );
    }
}
