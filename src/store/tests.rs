use std::sync::Arc;
use std::thread;

use geo::Point;
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use time::macros::datetime;
use time::Duration;

use super::{ManualClock, PositionReport, PositionStore, CLEANUP_WINDOW, LISTING_RETENTION};
use crate::FleetError;

fn store_at(clock: &Arc<ManualClock>) -> PositionStore {
    PositionStore::with_parts(clock.clone(), Box::new(StdRng::seed_from_u64(7)))
}

fn report(id: &str, lat: f64, lon: f64) -> PositionReport {
    PositionReport::basic(id.to_string(), Point::new(lon, lat))
}

#[test]
fn upsert_replaces_by_device() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 10:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("bus_1", 33.88, 10.10).speed(30.0).direction(90.0))
        .map_err(|e| e.to_string())?;
    clock.advance(Duration::seconds(30));
    store
        .upsert(report("bus_1", 33.90, 10.12).speed(45.0).direction(180.0))
        .map_err(|e| e.to_string())?;

    assert_eq!(1, store.count().map_err(|e| e.to_string())?);

    let rec = store.get("bus_1").map_err(|e| e.to_string())?;
    assert_eq!(33.90, rec.latitude);
    assert_eq!(10.12, rec.longitude);
    assert_eq!(45.0, rec.speed);
    assert_eq!(180.0, rec.direction);
    assert_eq!(datetime!(2024-03-15 10:00:30 UTC), rec.timestamp);

    Ok(())
}

#[test]
fn device_ids_are_trimmed_on_every_path() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 10:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report(" bus_1", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    let rec = store
        .upsert(report("bus_1 ", 33.90, 10.12))
        .map_err(|e| e.to_string())?;

    assert_eq!("bus_1", rec.device_id);
    assert_eq!(1, store.count().map_err(|e| e.to_string())?);
    assert_eq!(33.90, store.get(" bus_1 ").map_err(|e| e.to_string())?.latitude);

    Ok(())
}

#[test]
fn upsert_replaces_simulated_flag() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 10:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("bus_001", 33.88, 10.10).simulated("Line 2".to_string(), 12))
        .map_err(|e| e.to_string())?;
    let rec = store
        .upsert(report("bus_001", 33.88, 10.10))
        .map_err(|e| e.to_string())?;

    assert!(!rec.simulated);
    assert_eq!(None, rec.route);
    assert_eq!(None, rec.passengers);
    assert_eq!(0, store.count_simulated().map_err(|e| e.to_string())?);
    assert_eq!(1, store.count_real().map_err(|e| e.to_string())?);

    Ok(())
}

#[test]
fn upsert_draws_missing_speed_and_direction() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 10:00 UTC)));
    let store = PositionStore::with_parts(clock, Box::new(StepRng::new(0, 0)));

    let rec = store
        .upsert(report("bus_1", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    assert_eq!(20.0, rec.speed);
    assert_eq!(0.0, rec.direction);

    let rec = store
        .upsert(report("bus_2", 33.88, 10.10).speed(0.0))
        .map_err(|e| e.to_string())?;
    assert_eq!(0.0, rec.speed);

    Ok(())
}

#[test]
fn random_defaults_stay_in_range() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 10:00 UTC)));
    let store = store_at(&clock);

    for i in 0..200 {
        let rec = store
            .upsert(report(&format!("dev{}", i), 0.0, 0.0))
            .map_err(|e| e.to_string())?;
        assert!((20.0..100.0).contains(&rec.speed));
        assert!((0.0..360.0).contains(&rec.direction));
    }

    Ok(())
}

#[test]
fn upsert_rejects_invalid_reports() {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 10:00 UTC)));
    let store = store_at(&clock);

    let err = store.upsert(report("", 1.0, 2.0)).unwrap_err();
    assert!(matches!(err, FleetError::Validation { field: "device_id", .. }));

    let err = store.upsert(report("d1", f64::NAN, 2.0)).unwrap_err();
    assert!(matches!(err, FleetError::Validation { field: "latitude", .. }));

    let err = store.upsert(report("d1", 1.0, f64::INFINITY)).unwrap_err();
    assert!(matches!(err, FleetError::Validation { field: "longitude", .. }));

    assert_eq!(Ok(0), store.count());
    assert_eq!(Err(FleetError::NotFound("d1".to_string())), store.get("d1"));
}

#[test]
fn get_unknown_device() {
    let store = PositionStore::new();

    let err = store.get("ghost").unwrap_err();
    assert_eq!("Device `ghost` not found", err.to_string());
}

#[test]
fn list_prunes_past_retention() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("old", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    clock.advance(Duration::minutes(90));
    store
        .upsert(report("mid", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    clock.advance(Duration::minutes(31));
    store
        .upsert(report("new", 33.88, 10.10))
        .map_err(|e| e.to_string())?;

    let listed = store
        .list_fresh(LISTING_RETENTION)
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|r| r.device_id.as_str()).collect();
    assert_eq!(vec!["mid", "new"], ids);

    // the stale record is gone for good, not just hidden
    assert_eq!(2, store.count().map_err(|e| e.to_string())?);
    assert!(store.get("old").is_err());

    Ok(())
}

#[test]
fn list_keeps_record_exactly_at_retention() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("edge", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    clock.advance(LISTING_RETENTION);
    assert_eq!(1, store.list_fresh(LISTING_RETENTION).map_err(|e| e.to_string())?.len());

    clock.advance(Duration::milliseconds(1));
    assert!(store.list_fresh(LISTING_RETENTION).map_err(|e| e.to_string())?.is_empty());

    Ok(())
}

#[test]
fn cleanup_uses_its_own_window() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    for id in ["a", "b", "c"] {
        store
            .upsert(report(id, 33.88, 10.10))
            .map_err(|e| e.to_string())?;
    }
    clock.advance(Duration::minutes(75));
    store
        .upsert(report("d", 33.88, 10.10))
        .map_err(|e| e.to_string())?;

    // listing keeps everything younger than two hours
    assert_eq!(4, store.list_fresh(LISTING_RETENTION).map_err(|e| e.to_string())?.len());

    let total_before = store.count().map_err(|e| e.to_string())?;
    let report = store
        .cleanup_older_than(CLEANUP_WINDOW)
        .map_err(|e| e.to_string())?;

    assert_eq!(3, report.removed_count);
    assert_eq!(1, report.remaining_count);
    assert_eq!(total_before, report.removed_count + report.remaining_count);
    assert!(store.get("d").is_ok());

    Ok(())
}

#[test]
fn remove_all_simulated_keeps_real() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("bus_1", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    for i in 1..=3 {
        store
            .upsert(report(&format!("bus_{:03}", i), 33.88, 10.10).simulated("Line 1".to_string(), 3))
            .map_err(|e| e.to_string())?;
    }

    assert_eq!(3, store.remove_all_simulated().map_err(|e| e.to_string())?);
    assert_eq!(1, store.count().map_err(|e| e.to_string())?);
    assert!(store.get("bus_1").is_ok());

    Ok(())
}

#[test]
fn replace_simulated_writes_nothing_on_bad_report() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("bus_001", 33.88, 10.10).simulated("Line 2".to_string(), 3))
        .map_err(|e| e.to_string())?;

    let batch = vec![
        report("bus_001", 33.9, 10.1).simulated("Line 2".to_string(), 4),
        report("bus_002", f64::NAN, 10.1).simulated("Line 3".to_string(), 5),
    ];
    assert!(store.replace_simulated(batch).is_err());

    let rec = store.get("bus_001").map_err(|e| e.to_string())?;
    assert_eq!(33.88, rec.latitude);
    assert_eq!(1, store.count().map_err(|e| e.to_string())?);

    Ok(())
}

#[test]
fn stats_never_evict() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    store
        .upsert(report("old", 33.88, 10.10))
        .map_err(|e| e.to_string())?;
    clock.advance(Duration::hours(3));

    let stats = store.compute_stats().map_err(|e| e.to_string())?;
    assert_eq!(1, stats.total_buses);
    assert_eq!(0, stats.recent_buses);
    assert_eq!(Some(datetime!(2024-03-15 8:00 UTC)), stats.last_update);
    assert_eq!(datetime!(2024-03-15 11:00 UTC), stats.server_time);
    assert_eq!(1, store.count().map_err(|e| e.to_string())?);

    Ok(())
}

#[test]
fn concurrent_upserts_never_mix_fields() -> Result<(), String> {
    let store = PositionStore::new();

    thread::scope(|s| {
        for writer in 0..8 {
            let store = &store;
            s.spawn(move || {
                for _ in 0..200 {
                    let v = writer as f64;
                    let _ = store.upsert(report("shared", v, v).speed(v).direction(v));
                }
            });
        }
    });

    let rec = store.get("shared").map_err(|e| e.to_string())?;
    assert_eq!(1, store.count().map_err(|e| e.to_string())?);
    assert_eq!(rec.latitude, rec.longitude);
    assert_eq!(rec.latitude, rec.speed);
    assert_eq!(rec.latitude, rec.direction);

    Ok(())
}

#[test]
fn concurrent_prune_spares_fresh_writes() -> Result<(), String> {
    let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 8:00 UTC)));
    let store = store_at(&clock);

    for i in 0..50 {
        store
            .upsert(report(&format!("stale{}", i), 33.88, 10.10))
            .map_err(|e| e.to_string())?;
    }
    clock.advance(Duration::hours(3));

    thread::scope(|s| {
        for writer in 0..4 {
            let store = &store;
            s.spawn(move || {
                for i in 0..50 {
                    let _ = store.upsert(report(&format!("fresh{}_{}", writer, i), 33.88, 10.10));
                }
            });
        }
        let store = &store;
        s.spawn(move || {
            for _ in 0..50 {
                let _ = store.list_fresh(LISTING_RETENTION);
                let _ = store.cleanup_older_than(CLEANUP_WINDOW);
            }
        });
    });

    let listed = store
        .list_fresh(LISTING_RETENTION)
        .map_err(|e| e.to_string())?;
    assert_eq!(200, listed.len());
    assert!(listed.iter().all(|r| r.device_id.starts_with("fresh")));

    let stats = store.compute_stats().map_err(|e| e.to_string())?;
    assert_eq!(stats.total_buses, stats.simulated_buses + stats.real_buses);

    Ok(())
}
