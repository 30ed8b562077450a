//! Enumerated column values.
//!
//! Each enum mirrors a `CHECK (... IN (...))` constraint in the schema.

use serde::{Deserialize, Serialize};

macro_rules! column_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::Error::InvalidValue(
                        format!("unknown {}: {}", $label, other),
                    )),
                }
            }
        }
    };
}

column_enum!(
    /// How a contact relates to the user.
    Relationship, "relationship" {
        Friend => "friend",
        BestFriend => "best_friend",
        Colleague => "colleague",
        Family => "family",
    }
);

column_enum!(
    /// What aspect of a contact a cognitive unit describes.
    UnitCategory, "cognitive unit category" {
        WorkStyle => "work_style",
        Values => "values",
        Communication => "communication",
        Behavior => "behavior",
    }
);

column_enum!(
    UnitStatus, "cognitive unit status" {
        Active => "active",
        Inactive => "inactive",
        Superseded => "superseded",
    }
);

column_enum!(
    InsightType, "insight type" {
        Suggestion => "suggestion",
        Reminder => "reminder",
        Pattern => "pattern",
    }
);

column_enum!(
    ReminderType, "reminder type" {
        FollowUp => "follow_up",
        Birthday => "birthday",
        CheckIn => "check_in",
    }
);

column_enum!(
    ReminderStatus, "reminder status" {
        Pending => "pending",
        Completed => "completed",
        Snoozed => "snoozed",
    }
);

column_enum!(
    Priority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

column_enum!(
    /// Outcome of one AI invocation.
    AiStatus, "AI processing status" {
        Success => "success",
        Error => "error",
        Pending => "pending",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for rel in Relationship::ALL {
            assert_eq!(rel.as_str().parse::<Relationship>().unwrap(), *rel);
        }
        assert_eq!(ReminderType::FollowUp.to_string(), "follow_up");
        assert_eq!("check_in".parse::<ReminderType>().unwrap(), ReminderType::CheckIn);
    }

    #[test]
    fn test_unknown_variant() {
        let err = "enemy".parse::<Relationship>().unwrap_err();
        assert!(err.to_string().contains("unknown relationship: enemy"));
    }

    #[test]
    fn test_serde_matches_column_text() {
        let json = serde_json::to_string(&UnitCategory::WorkStyle).unwrap();
        assert_eq!(json, "\"work_style\"");
        let back: AiStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(back, AiStatus::Pending);
    }
}
