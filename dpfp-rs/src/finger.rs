use std::convert::TryFrom;
use std::fmt;

/// Finger position recorded in templates created from raw images.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FingerPosition {
    Unknown = 0,
    RightThumb = 1,
    RightIndex = 2,
    RightMiddle = 3,
    RightRing = 4,
    RightLittle = 5,
    LeftThumb = 6,
    LeftIndex = 7,
    LeftMiddle = 8,
    LeftRing = 9,
    LeftLittle = 10,
}

impl FingerPosition {
    pub fn raw(self) -> i32 {
        self as i32
    }
}

impl Default for FingerPosition {
    fn default() -> Self {
        FingerPosition::Unknown
    }
}

impl fmt::Display for FingerPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let string = match self {
            FingerPosition::Unknown => "Unknown",
            FingerPosition::RightThumb => "RightThumb",
            FingerPosition::RightIndex => "RightIndex",
            FingerPosition::RightMiddle => "RightMiddle",
            FingerPosition::RightRing => "RightRing",
            FingerPosition::RightLittle => "RightLittle",
            FingerPosition::LeftThumb => "LeftThumb",
            FingerPosition::LeftIndex => "LeftIndex",
            FingerPosition::LeftMiddle => "LeftMiddle",
            FingerPosition::LeftRing => "LeftRing",
            FingerPosition::LeftLittle => "LeftLittle",
        };

        write!(f, "{}", string)
    }
}

impl TryFrom<i32> for FingerPosition {
    type Error = crate::DpfpError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FingerPosition::Unknown),
            1 => Ok(FingerPosition::RightThumb),
            2 => Ok(FingerPosition::RightIndex),
            3 => Ok(FingerPosition::RightMiddle),
            4 => Ok(FingerPosition::RightRing),
            5 => Ok(FingerPosition::RightLittle),
            6 => Ok(FingerPosition::LeftThumb),
            7 => Ok(FingerPosition::LeftIndex),
            8 => Ok(FingerPosition::LeftMiddle),
            9 => Ok(FingerPosition::LeftRing),
            10 => Ok(FingerPosition::LeftLittle),
            n => Err(crate::DpfpError::TryFromError(n.into())),
        }
    }
}
