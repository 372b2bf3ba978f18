//! Participant identity: a stable id plus presentation fields, persisted
//! in a profile file so a participant keeps the same identity across
//! sessions on the same machine.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use directories::BaseDirs;
use rand::seq::IndexedRandom;
use shared::Participant;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Failure loading or persisting the identity profile.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("profile I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("profile is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no home directory to place the profile in")]
    NoHomeDirectory,
}

/// Display names assigned to first-run participants.
const NAMES: [&str; 8] = [
    "Alex Morgan",
    "Jamie Smith",
    "Jordan Taylor",
    "Casey Johnson",
    "Riley Davis",
    "Avery Wilson",
    "Quinn Brown",
    "Cameron Miller",
];

/// Default profile location under the platform config directory.
///
/// # Errors
/// Fails when the platform reports no home directory.
pub fn default_profile_path() -> Result<PathBuf, IdentityError> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("driftchat").join("profile.json"))
        .ok_or(IdentityError::NoHomeDirectory)
}

/// Generates a fresh participant: random display name from the fixed list,
/// initials derived from it, and a new stable id.
pub fn generate() -> Participant {
    let mut rng = rand::rng();
    let name = (*NAMES.choose(&mut rng).unwrap_or(&NAMES[0])).to_string();
    let initials = initials_for(&name);
    Participant {
        id: Uuid::new_v4().to_string(),
        name,
        initials,
    }
}

/// Initials shown next to messages: first letter of each word.
pub fn initials_for(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect()
}

/// Loads the profile at `path`, generating and persisting one on first run.
///
/// # Errors
/// Fails on unreadable/unwritable profile files or malformed JSON; a
/// malformed profile is not silently regenerated, so a participant never
/// loses an identity to a transient parse issue.
pub fn load_or_create(path: &Path) -> Result<Participant, IdentityError> {
    if path.exists() {
        let content = fs::read_to_string(path)?;
        let participant: Participant = serde_json::from_str(&content)?;
        debug!(participant_id = participant.id, "loaded existing profile");
        return Ok(participant);
    }

    let participant = generate();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&participant)?)?;
    debug!(participant_id = participant.id, "created new profile");
    Ok(participant)
}
