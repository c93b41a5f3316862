//! Tracks: ordered promotion ladders of group names

use super::errors::{ModelError, TrackError};
use super::holder::ChangeTracker;
use super::types::validate_name;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TrackRecord")]
pub struct Track {
    name: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(skip)]
    tracker: ChangeTracker,
}

/// Track as stored, before entries are lowercased and deduplicated
#[derive(Deserialize)]
struct TrackRecord {
    name: String,
    #[serde(default)]
    groups: Vec<String>,
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        let mut groups: Vec<String> = Vec::with_capacity(record.groups.len());
        for group in record.groups {
            let group = group.to_lowercase();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        Track {
            name: record.name.to_lowercase(),
            groups,
            tracker: ChangeTracker::default(),
        }
    }
}

impl Track {
    pub fn new(name: &str) -> Result<Self, ModelError> {
        let mut track = Track {
            name: validate_name(name)?,
            groups: Vec::new(),
            tracker: ChangeTracker::default(),
        };
        track.tracker.touch();
        Ok(track)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, group: &str) -> bool {
        self.index_of(group).is_some()
    }

    pub fn index_of(&self, group: &str) -> Option<usize> {
        let group = group.to_lowercase();
        self.groups.iter().position(|g| *g == group)
    }

    /// Group after `group`, if any
    pub fn next(&self, group: &str) -> Option<&str> {
        let index = self.index_of(group)?;
        self.groups.get(index + 1).map(String::as_str)
    }

    /// Group before `group`, if any
    pub fn previous(&self, group: &str) -> Option<&str> {
        let index = self.index_of(group)?;
        index.checked_sub(1).and_then(|i| self.groups.get(i)).map(String::as_str)
    }

    pub fn append_group(&mut self, group: &str) -> Result<(), TrackError> {
        let index = self.groups.len();
        self.insert_group(group, index)
    }

    /// Insert at `index` (clamped to the end of the track)
    pub fn insert_group(&mut self, group: &str, index: usize) -> Result<(), TrackError> {
        let group = group.to_lowercase();
        if self.contains(&group) {
            return Err(TrackError::AlreadyContains {
                track: self.name.clone(),
                group,
            });
        }
        let index = index.min(self.groups.len());
        self.groups.insert(index, group);
        self.tracker.touch();
        Ok(())
    }

    pub fn remove_group(&mut self, group: &str) -> Result<(), TrackError> {
        let index = self
            .index_of(group)
            .ok_or_else(|| TrackError::DoesNotContain {
                track: self.name.clone(),
                group: group.to_lowercase(),
            })?;
        self.groups.remove(index);
        self.tracker.touch();
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    pub fn revision(&self) -> u64 {
        self.tracker.revision()
    }

    pub fn mark_saved(&mut self, revision: u64) -> bool {
        self.tracker.mark_saved(revision)
    }

    pub fn mark_clean(&mut self) {
        let revision = self.tracker.revision();
        self.tracker.mark_saved(revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> Track {
        let mut track = Track::new("staff").unwrap();
        for group in ["helper", "mod", "admin"] {
            track.append_group(group).unwrap();
        }
        track
    }

    #[test]
    fn test_navigation() {
        let track = staff();
        assert_eq!(track.next("helper"), Some("mod"));
        assert_eq!(track.next("admin"), None);
        assert_eq!(track.previous("mod"), Some("helper"));
        assert_eq!(track.previous("helper"), None);
        assert_eq!(track.next("unknown"), None);
    }

    #[test]
    fn test_entries_are_unique() {
        let mut track = staff();
        let err = track.append_group("MOD").unwrap_err();
        assert!(matches!(err, TrackError::AlreadyContains { .. }));
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn test_stored_entries_deduplicated() {
        let json = r#"{"name":"staff","groups":["helper","Mod","mod","admin","helper"]}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.groups(), ["helper", "mod", "admin"]);
        assert!(!track.is_dirty());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut track = staff();
        track.insert_group("trial", 1).unwrap();
        assert_eq!(track.groups(), ["helper", "trial", "mod", "admin"]);

        track.insert_group("owner", 99).unwrap();
        assert_eq!(track.groups().last().map(String::as_str), Some("owner"));

        track.remove_group("trial").unwrap();
        assert!(matches!(
            track.remove_group("trial"),
            Err(TrackError::DoesNotContain { .. })
        ));
    }
}
