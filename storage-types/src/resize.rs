//! Classification of a partition geometry change

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAction {
    None,
    Grow,
    Shrink,
    MoveRight,
    MoveRightGrow,
    MoveRightShrink,
    MoveLeft,
    MoveLeftGrow,
    MoveLeftShrink,
}

impl ResizeAction {
    pub fn is_move(&self) -> bool {
        matches!(
            self,
            Self::MoveRight
                | Self::MoveRightGrow
                | Self::MoveRightShrink
                | Self::MoveLeft
                | Self::MoveLeftGrow
                | Self::MoveLeftShrink
        )
    }

    pub fn grows(&self) -> bool {
        matches!(self, Self::Grow | Self::MoveRightGrow | Self::MoveLeftGrow)
    }

    pub fn shrinks(&self) -> bool {
        matches!(self, Self::Shrink | Self::MoveRightShrink | Self::MoveLeftShrink)
    }
}

impl std::fmt::Display for ResizeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Grow => "grow",
            Self::Shrink => "shrink",
            Self::MoveRight => "move right",
            Self::MoveRightGrow => "move right and grow",
            Self::MoveRightShrink => "move right and shrink",
            Self::MoveLeft => "move left",
            Self::MoveLeftGrow => "move left and grow",
            Self::MoveLeftShrink => "move left and shrink",
        };
        f.write_str(name)
    }
}
