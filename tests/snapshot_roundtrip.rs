//! Model snapshot round-trip integration tests.
//!
//! A model that has grown and learned is captured as a ModelSnapshot,
//! serialised to JSON, deserialised back and restored. The restored model
//! must carry the same roster, counters and network, and must keep
//! estimating the same way.

#[cfg(feature = "serde")]
mod tests {
    use mmibn_core::snapshot::{ModelSnapshot, MODEL_SNAPSHOT_VERSION};
    use mmibn_core::{
        FaceReading, Gender, GenderReading, IdentityModel, IdentityRecord, InteractionTime,
        Observation, RangeReading, RecogniserConfig, UpdateMethod,
    };

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn config() -> RecogniserConfig {
        RecogniserConfig::default()
            .with_update_method(UpdateMethod::Evidence, Some(UpdateMethod::Sum))
            .with_num_recog_min(2)
    }

    fn reading(id: &str, age: f64) -> Observation {
        Observation {
            face: FaceReading {
                accuracy: 1.0,
                candidates: vec![(id.to_string(), 0.85)],
            },
            gender: GenderReading {
                gender: Gender::Male,
                confidence: 0.8,
            },
            age: RangeReading {
                value: age,
                confidence: 0.7,
            },
            height: RangeReading {
                value: 178.0,
                confidence: 0.7,
            },
            time: InteractionTime::parse("17:30:00", 5).expect("valid time"),
        }
    }

    /// A model with three identities and four learned confirmations.
    fn trained_model() -> IdentityModel {
        let roster = vec![
            IdentityRecord::new("1", "ari", Some(Gender::Male), 29, 178.0, vec![]),
            IdentityRecord::new("2", "bea", Some(Gender::Female), 52, 160.0, vec![]),
        ];
        let mut model = IdentityModel::from_roster(config(), roster).expect("valid roster");
        model.enroll_identity(IdentityRecord::new(
            "3",
            "cy",
            Some(Gender::Male),
            1990,
            185.0,
            vec![InteractionTime::parse("08:00:00", 3).expect("valid time")],
        ));
        for (id, age) in [("1", 29.0), ("3", 34.0), ("1", 30.0), ("2", 50.0)] {
            model.begin_session(false, None);
            model.estimate_identity(Some(reading(id, age)));
            model.confirm_identity(Some(id)).expect("enrolled identity");
        }
        model
    }

    fn round_trip(model: &IdentityModel) -> ModelSnapshot {
        let snapshot = ModelSnapshot::from_model(model);
        let json = serde_json::to_string(&snapshot).expect("serialise");
        serde_json::from_str(&json).expect("deserialise")
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let model = trained_model();
        let snapshot = ModelSnapshot::from_model(&model);
        let restored = round_trip(&model);
        assert_eq!(restored, snapshot);
        assert_eq!(restored.version, MODEL_SNAPSHOT_VERSION);
        assert_eq!(restored.identity_count(), 3);
        assert_eq!(restored.num_recognitions, 4);
    }

    #[test]
    fn test_restored_model_matches_original() {
        let mut original = trained_model();
        let mut restored = round_trip(&original)
            .restore(config())
            .expect("consistent snapshot");

        assert_eq!(restored.labels(), original.labels());
        assert_eq!(restored.num_recognitions(), original.num_recognitions());
        assert_eq!(restored.network(), original.network());
        assert_eq!(
            restored.database().get("1").map(|r| r.occurrences),
            original.database().get("1").map(|r| r.occurrences)
        );

        original.begin_session(false, None);
        restored.begin_session(false, None);
        let a = original.estimate_identity(Some(reading("1", 29.0)));
        let b = restored.estimate_identity(Some(reading("1", 29.0)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_snapshot_before_first_enrollment_has_no_network() {
        let model = IdentityModel::new(config()).expect("valid config");
        let snapshot = round_trip(&model);
        assert_eq!(snapshot.identity_count(), 0);
        assert!(snapshot.likelihoods.is_empty());
        assert!(snapshot.prior.is_empty());
        let restored = snapshot.restore(config()).expect("roster only");
        assert_eq!(restored.num_identities(), 1);
        assert!(restored.network().is_none());
    }

    #[test]
    fn test_roster_without_rows_is_rebuilt() {
        let mut snapshot = ModelSnapshot::from_model(&trained_model());
        snapshot.prior.clear();
        snapshot.likelihoods.clear();
        let restored = snapshot.restore(config()).expect("rebuilt from roster");
        assert_eq!(restored.num_identities(), 4);
        assert_eq!(restored.num_recognitions(), 4);
        assert_eq!(restored.network().map(|n| n.cardinality()), Some(4));
    }
}
