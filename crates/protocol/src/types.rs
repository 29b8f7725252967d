use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced while interpreting wire values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown angle type: {0}")]
    UnknownAngle(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Camera angle tag attached to an uploaded video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleType {
    Wide,
    Closeup,
    Crowd,
    GoalAngle,
    Stage,
    #[default]
    Other,
}

impl AngleType {
    pub const ALL: [AngleType; 6] = [
        AngleType::Wide,
        AngleType::Closeup,
        AngleType::Crowd,
        AngleType::GoalAngle,
        AngleType::Stage,
        AngleType::Other,
    ];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AngleType::Wide => "wide",
            AngleType::Closeup => "closeup",
            AngleType::Crowd => "crowd",
            AngleType::GoalAngle => "goal_angle",
            AngleType::Stage => "stage",
            AngleType::Other => "other",
        }
    }
}

impl fmt::Display for AngleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AngleType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AngleType::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| ProtocolError::UnknownAngle(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_type_wire_names() {
        for angle in AngleType::ALL {
            let json = serde_json::to_string(&angle).unwrap();
            assert_eq!(json, format!("\"{}\"", angle.as_str()));
        }
    }

    #[test]
    fn angle_type_parses_case_insensitively() {
        assert_eq!("GOAL_ANGLE".parse::<AngleType>().unwrap(), AngleType::GoalAngle);
        assert_eq!(" wide ".parse::<AngleType>().unwrap(), AngleType::Wide);
    }

    #[test]
    fn angle_type_rejects_unknown() {
        let err = "drone".parse::<AngleType>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAngle(ref s) if s == "drone"));
    }

    #[test]
    fn angle_type_defaults_to_other() {
        assert_eq!(AngleType::default(), AngleType::Other);
    }
}
