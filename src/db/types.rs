use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userstatus", rename_all = "lowercase")]
pub(crate) enum UserStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "questiontype", rename_all = "lowercase")]
pub(crate) enum QuestionType {
    Single,
    Multiple,
    Judge,
    Fill,
    Essay,
}

impl QuestionType {
    #[cfg(test)]
    pub(crate) const ALL: [QuestionType; 5] =
        [Self::Single, Self::Multiple, Self::Judge, Self::Fill, Self::Essay];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Judge => "judge",
            Self::Fill => "fill",
            Self::Essay => "essay",
        }
    }

    /// Whether the type carries a fixed option list.
    pub(crate) fn has_options(self) -> bool {
        matches!(self, Self::Single | Self::Multiple)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficultylevel", rename_all = "lowercase")]
pub(crate) enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "approvalstatus", rename_all = "lowercase")]
pub(crate) enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "examgrade", rename_all = "lowercase")]
pub(crate) enum ExamGrade {
    Excellent,
    Good,
    Pass,
    Fail,
}

impl ExamGrade {
    pub(crate) fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 80.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}
