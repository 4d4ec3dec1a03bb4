//! Error types for the simulation.
//!
//! Two families exist. [`GameError`] covers conditions that make a session
//! unusable (a broken catalog, an unreadable save-state) and is returned
//! from construction-time APIs. [`ActionError`] covers the expected,
//! recoverable rejections of player actions; the public boolean wrappers
//! on [`Simulation`](crate::simulation::Simulation) swallow it after
//! logging.

use thiserror::Error;

use crate::store::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for fatal simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Configuration failed validation.
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the source that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid simulation state (e.g. save-state encoding failures).
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// Reason a player action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The tower type is not in the catalog.
    #[error("Unknown tower type: {0}")]
    UnknownTowerType(String),

    /// The position is not inside any buildable area.
    #[error("Position is outside every buildable area")]
    OutOfBounds,

    /// Another tower is closer than the minimum spacing.
    #[error("Position overlaps tower {0}")]
    Overlapping(EntityId),

    /// Not enough gold.
    #[error("Insufficient gold: need {required}, have {available}")]
    InsufficientFunds {
        /// Gold required.
        required: u32,
        /// Gold available.
        available: u32,
    },

    /// The tower does not exist (never placed, or already sold).
    #[error("Tower not found: {0}")]
    TowerNotFound(EntityId),

    /// The tower has no such upgrade available.
    #[error("Upgrade '{0}' is not available for this tower")]
    UnknownUpgrade(String),

    /// The upgrade was already applied.
    #[error("Upgrade '{0}' was already applied")]
    UpgradeAlreadyApplied(String),

    /// Tower level is too low for the upgrade.
    #[error("Upgrade requires level {required}, tower is level {current}")]
    LevelTooLow {
        /// Level required by the upgrade.
        required: u32,
        /// Current tower level.
        current: u32,
    },

    /// A prerequisite upgrade has not been applied.
    #[error("Upgrade requires '{0}' first")]
    MissingPrerequisite(String),

    /// The game already ended.
    #[error("The game is over")]
    GameOver,
}
