//! Error taxonomy for the engine.
//!
//! Recoverable rule failures (slot already used, out of reach, ...) are NOT
//! errors: they surface as [`ActionOutcome`](crate::model::action::ActionOutcome)
//! variants inside a successful `StepResult`. The types here cover the two
//! remaining channels: malformed host input, and configuration that cannot
//! produce a session at all. Invariant violations (negative HP, stack counts
//! above the cap, duplicate participants) panic; those are engine bugs and
//! the session must not be resumed.

use serde::{Deserialize, Serialize};

/// Host-input errors: the submitted action referenced something that does not
/// exist or was submitted out of order. No state change occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineError {
    UnknownActor(u32),
    UnknownTarget(u32),
    UnknownFeat(u32),
    NotCurrentActor { submitted: u32, current: u32 },
    MalformedAction(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownActor(id) => write!(f, "Unknown actor: {}", id),
            EngineError::UnknownTarget(id) => write!(f, "Unknown target: {}", id),
            EngineError::UnknownFeat(id) => write!(f, "Unknown feat: {}", id),
            EngineError::NotCurrentActor { submitted, current } => write!(
                f,
                "Actor {} submitted an action but it is {}'s turn",
                submitted, current
            ),
            EngineError::MalformedAction(msg) => write!(f, "Malformed action: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Configuration errors, fatal at session construction: the catalogs the
/// host supplied reference ids or shapes the engine cannot resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    UnknownEffect(String),
    UnknownStatusCondition { feat: String, effect_id: String },
    DuplicateFeat(u32),
    DuplicateEffect(String),
    InvalidDefinition(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownEffect(id) => write!(f, "Unknown effect id: {}", id),
            ConfigError::UnknownStatusCondition { feat, effect_id } => write!(
                f,
                "Feat '{}' applies unregistered status effect '{}'",
                feat, effect_id
            ),
            ConfigError::DuplicateFeat(id) => write!(f, "Duplicate feat id: {}", id),
            ConfigError::DuplicateEffect(id) => write!(f, "Duplicate effect id: {}", id),
            ConfigError::InvalidDefinition(msg) => write!(f, "Invalid definition: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = EngineError::NotCurrentActor {
            submitted: 3,
            current: 1,
        };
        assert_eq!(
            err.to_string(),
            "Actor 3 submitted an action but it is 1's turn"
        );

        let cfg = ConfigError::UnknownStatusCondition {
            feat: "fireball".to_string(),
            effect_id: "burning".to_string(),
        };
        assert!(cfg.to_string().contains("fireball"));
        assert!(cfg.to_string().contains("burning"));
    }
}
