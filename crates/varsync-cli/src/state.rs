//! Value source backed by a JSON state file
//!
//! The file holds a serialized [`StaticValueSource`]. It is re-read whenever
//! its modification time changes; every tick starts by asking for the active
//! session, so that is where the reload happens.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use varsync_core::source::VarbitComposition;
use varsync_core::{PlayerSession, Skill, StaticValueSource, ValueSource};

pub struct StateFileSource {
    path: PathBuf,
    state: RwLock<(Option<SystemTime>, StaticValueSource)>,
}

impl StateFileSource {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let (modified, state) = read_state(&path)?;
        Ok(Self {
            path,
            state: RwLock::new((modified, state)),
        })
    }

    fn reload_if_changed(&self) {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok();
        if modified.is_some() && modified == self.state.read().0 {
            return;
        }

        match read_state(&self.path) {
            Ok(fresh) => {
                tracing::debug!("Reloaded state file {}", self.path.display());
                *self.state.write() = fresh;
            }
            Err(e) => {
                tracing::warn!("Keeping previous state, failed to read {}: {}", self.path.display(), e);
            }
        }
    }
}

fn read_state(path: &Path) -> anyhow::Result<(Option<SystemTime>, StaticValueSource)> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    let content = std::fs::read_to_string(path)?;
    let state: StaticValueSource = serde_json::from_str(&content)?;
    Ok((modified, state))
}

impl ValueSource for StateFileSource {
    fn active_session(&self) -> Option<PlayerSession> {
        self.reload_if_changed();
        self.state.read().1.active_session()
    }

    fn varp(&self, id: i32) -> Option<i32> {
        self.state.read().1.varp(id)
    }

    fn varbit_composition(&self, id: i32) -> Option<VarbitComposition> {
        self.state.read().1.varbit_composition(id)
    }

    fn skill_level(&self, skill: Skill) -> Option<i32> {
        self.state.read().1.skill_level(skill)
    }
}
