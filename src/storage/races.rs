//! Race catalog loading

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::career::RaceCatalog;

/// Load a race catalog from a JSON file
pub fn load_race_catalog(path: &Path) -> Result<RaceCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read race catalog {}", path.display()))?;
    let catalog: RaceCatalog = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse race catalog {}", path.display()))?;
    info!("Loaded {} races from {:?}", catalog.len(), path);
    Ok(catalog)
}

/// Save a race catalog to a JSON file
pub fn save_race_catalog(catalog: &RaceCatalog, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(catalog)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::{CareerYear, Half, Month, RaceEntry, RaceGrade, Track};
    use tempfile::tempdir;

    #[test]
    fn test_catalog_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("races.json");
        let catalog = RaceCatalog::new(vec![RaceEntry {
            id: "japan_cup".into(),
            name: "Japan Cup".into(),
            year: CareerYear::Senior,
            month: Month::Nov,
            half: Half::Late,
            grade: RaceGrade::G1,
            track: Track::Turf,
            distance_m: 2400,
            fans: 20000,
            skill_points: 50,
        }]);

        save_race_catalog(&catalog, &path).unwrap();
        assert_eq!(load_race_catalog(&path).unwrap(), catalog);
    }

    #[test]
    fn test_catalog_reads_minimal_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("races.json");
        std::fs::write(
            &path,
            r#"{"races":[{"id":"op1","name":"Open","year":"classic","month":"may","half":"early","grade":"OP","track":"dirt","distance_m":1200}]}"#,
        )
        .unwrap();
        let catalog = load_race_catalog(&path).unwrap();
        let race = catalog.get("op1").unwrap();
        assert_eq!(race.grade, RaceGrade::Open);
        assert_eq!(race.fans, 0);
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_race_catalog(&dir.path().join("nope.json")).is_err());
    }
}
