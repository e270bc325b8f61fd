#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::CuratorError;
    use crate::playlist::genres::GenreNormalizer;
    use approx::assert_relative_eq;

    fn write_temp(name: &str, content: &str) -> String {
        let file = format!("curator-{}-{name}.json", std::process::id());
        let path = std::env::temp_dir().join(file);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CuratorConfig::default();
        assert!(config.validate().is_ok());

        assert_relative_eq!(config.scoring.half_life_days, 30.0);
        assert_eq!(config.scoring.play_count_cap, 50);
        assert_eq!(config.discovery.min_plays_unrated, 3);
        assert_eq!(config.discovery.fetch_chunk_size, 200);
        assert_eq!(config.selection.max_per_artist, 2);
        assert_relative_eq!(config.selection.max_genre_share, 0.4);
        assert_relative_eq!(config.exploration.baseline, 0.15);
        assert_eq!(config.adaptive.cooldown_secs, 300);
        assert_eq!(config.genres.table.version, 1);
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let json = r#"{
            "scoring": { "half_life_days": 14.0 },
            "selection": { "max_per_artist": 3, "max_per_genre": 5 }
        }"#;
        let config: CuratorConfig = serde_json::from_str(json).unwrap();

        assert_relative_eq!(config.scoring.half_life_days, 14.0);
        assert_relative_eq!(config.scoring.recency_weight, 0.7);
        assert_eq!(config.selection.max_per_artist, 3);
        assert_eq!(config.selection.max_per_genre, Some(5));
        assert_eq!(config.discovery.target_count, 50);
        assert!(config.adaptive.backfill);
    }

    #[test]
    fn test_custom_rewrite_table_is_loaded() {
        let json = r#"{
            "genres": {
                "table": {
                    "version": 2,
                    "rules": [
                        { "category": "shoegaze", "pattern": "nu gaze", "replacement": "shoegaze" }
                    ]
                },
                "ignore": ["indie"]
            }
        }"#;
        let config: CuratorConfig = serde_json::from_str(json).unwrap();
        let normalizer = GenreNormalizer::new(&config.genres);

        assert_eq!(normalizer.table_version(), 2);
        assert_eq!(normalizer.normalize("Nu Gaze"), "shoegaze");
        assert_eq!(normalizer.process(&["Indie", "Nu Gaze"]), vec!["shoegaze"]);
    }

    #[test]
    fn test_load_from_file() {
        let path = write_temp("valid", r#"{ "discovery": { "target_count": 25 } }"#);
        let config = CuratorConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.discovery.target_count, 25);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = write_temp("invalid", r#"{ "scoring": { "half_life_days": 0.0 } }"#);
        let result = CuratorConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(CuratorError::Config(_))));
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_json() {
        let missing = CuratorConfig::load_from_file("/nonexistent/curator.json");
        assert!(matches!(missing, Err(CuratorError::Io(_))));

        let path = write_temp("malformed", "{ not json");
        let malformed = CuratorConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(malformed, Err(CuratorError::Json(_))));
    }

    #[test]
    fn test_validate_genre_share_bounds() {
        let mut config = CuratorConfig::default();
        config.selection.max_genre_share = 0.0;
        assert!(config.validate().is_err());

        config.selection.max_genre_share = 1.0;
        assert!(config.validate().is_ok());

        config.selection.max_genre_share = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_exploration_range() {
        let mut config = CuratorConfig::default();
        config.exploration.min_rate = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_adaptive_interval_bounds() {
        let mut config = CuratorConfig::default();
        config.adaptive.session_timeout_secs = i64::MAX;
        assert!(matches!(config.validate(), Err(CuratorError::Config(_))));

        config.adaptive.session_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.adaptive.session_timeout_secs = MAX_ADAPTIVE_SECS;
        assert!(config.validate().is_ok());

        config.adaptive.window_secs = MAX_ADAPTIVE_SECS + 1;
        assert!(config.validate().is_err());

        config.adaptive.window_secs = 600;
        config.adaptive.cooldown_secs = i64::MAX;
        assert!(config.validate().is_err());

        config.adaptive.cooldown_secs = 0;
        assert!(config.validate().is_ok());
    }
}
