use carousel_rs::{
    BloomConfigBuilder, Carousel, CarouselConfigBuilder, CarouselError, Clock,
    LogOutcome, MemorySink, SimulationClock, WallClock, spawn_drain,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{thread, time::Duration};

const INTERVAL: u64 = 10;

// Decimal keys fingerprint to their own value so bucket membership is
// simply `key & mask`.
fn numeric(key: &[u8]) -> u64 {
    std::str::from_utf8(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

// Helper function to create an engine on numeric keys with a roomy filter
fn create_numeric_carousel(
    target_size: usize,
    clock: &SimulationClock,
) -> Carousel<SimulationClock, MemorySink> {
    let filter = BloomConfigBuilder::default()
        .num_bits(4096)
        .build()
        .expect("Failed to build filter config");
    let config = CarouselConfigBuilder::default()
        .target_size(target_size)
        .filter(filter)
        .fingerprint(numeric)
        .build()
        .expect("Failed to build test config");

    Carousel::new(config, clock.clone(), INTERVAL, MemorySink::new())
        .expect("Failed to create test carousel")
}

// Helper function to create an engine with the reference parameters
fn create_reference_carousel(
    clock: &SimulationClock,
) -> Carousel<SimulationClock, MemorySink> {
    let filter = BloomConfigBuilder::default()
        .num_bits(128)
        .build()
        .expect("Failed to build filter config");
    let config = CarouselConfigBuilder::default()
        .target_size(10)
        .hysteresis_ratio(2.3)
        .filter(filter)
        .build()
        .expect("Failed to build test config");

    Carousel::new(config, clock.clone(), INTERVAL, MemorySink::new())
        .expect("Failed to create test carousel")
}

// Drives a target_size = 1 engine to depth 2 using keys 0, 2, 1, 3.
// Leaves it at phase 2 with an empty filter.
fn grow_to_depth_two(carousel: &mut Carousel<SimulationClock, MemorySink>) {
    assert_eq!(carousel.grow_threshold(), 1);
    for key in ["0", "2", "1", "3"] {
        assert_eq!(carousel.log(key, key), LogOutcome::Forwarded);
    }
    assert_eq!(carousel.depth(), 2);
    assert_eq!(carousel.phase(), 2);
    assert_eq!(carousel.mask(), 0b11);
    assert_eq!(carousel.matching_this_phase(), 0);
}

#[cfg(test)]
mod construction_tests {
    use super::*;

    #[test]
    fn test_zero_target_size_rejected() {
        let config = CarouselConfigBuilder::default()
            .target_size(0)
            .build()
            .unwrap();
        let result =
            Carousel::new(config, SimulationClock::new(), 1, MemorySink::new());
        assert!(matches!(result, Err(CarouselError::ZeroTargetSize)));
    }

    #[test]
    fn test_ratio_of_one_rejected() {
        let config = CarouselConfigBuilder::default()
            .hysteresis_ratio(1.0)
            .build()
            .unwrap();
        let result =
            Carousel::new(config, SimulationClock::new(), 1, MemorySink::new());
        assert!(matches!(
            result,
            Err(CarouselError::InvalidHysteresisRatio { .. })
        ));
    }

    #[test]
    fn test_phase_duration_from_clock() {
        let clock = SimulationClock::new();
        let carousel = create_reference_carousel(&clock);
        assert_eq!(carousel.phase_duration(), 10 * INTERVAL);
        assert!((carousel.shrink_threshold() - 10.0 / 2.3).abs() < 1e-9);
    }
}

#[cfg(test)]
mod dedup_tests {
    use super::*;

    #[test]
    fn test_same_key_forwarded_once_per_phase() {
        let clock = SimulationClock::new();
        let mut carousel = create_reference_carousel(&clock);

        for i in 0..1000 {
            carousel.log("the-key", &format!("entry-{i}"));
        }

        assert_eq!(carousel.sink().len(), 1);
        assert_eq!(carousel.stats().duplicates, 999);
        assert_eq!(carousel.depth(), 0);
    }

    #[test]
    fn test_first_entry_wins() {
        let clock = SimulationClock::new();
        let mut carousel = create_reference_carousel(&clock);

        assert_eq!(carousel.log("k", "e1"), LogOutcome::Forwarded);
        assert_eq!(carousel.log("k", "e2"), LogOutcome::Duplicate);

        assert_eq!(
            carousel.sink().entries,
            vec![("k".to_string(), "e1".to_string())]
        );
    }

    #[test]
    fn test_key_forwarded_again_next_phase() {
        let clock = SimulationClock::new();
        let mut carousel = create_reference_carousel(&clock);

        assert_eq!(carousel.log("k", "e1"), LogOutcome::Forwarded);
        clock.advance(carousel.phase_duration());
        assert_eq!(carousel.log("k", "e2"), LogOutcome::Forwarded);

        assert_eq!(carousel.phase(), 1);
        assert_eq!(carousel.sink().len(), 2);
    }

    #[test]
    fn test_empty_key_is_valid() {
        let clock = SimulationClock::new();
        let mut carousel = create_reference_carousel(&clock);
        assert_eq!(carousel.log("", ""), LogOutcome::Forwarded);
        assert_eq!(carousel.log("", ""), LogOutcome::Duplicate);
    }
}

#[cfg(test)]
mod overflow_tests {
    use super::*;

    #[test]
    fn test_eleventh_distinct_key_triggers_overflow() {
        let clock = SimulationClock::new();
        let mut carousel = create_reference_carousel(&clock);
        let mut overflow_at = None;

        for i in 0..20 {
            let key = format!("key-{i}");
            let depth_before = carousel.depth();
            carousel.log(&key, "entry");

            if depth_before == 0 && carousel.depth() == 1 {
                overflow_at = Some(carousel.sink().len());
                assert_eq!(carousel.matching_this_phase(), 0);
                assert_eq!(carousel.phase(), 1);
            }
        }

        // The 11th forward grows the partition, not the 10th
        assert_eq!(overflow_at, Some(11));
        assert_eq!(carousel.depth(), 1);
        assert_eq!(carousel.stats().overflows, 1);

        // Everything forwarded afterwards sits in bucket 1 of 2
        for (key, _) in &carousel.sink().entries[11..] {
            assert_eq!(
                carousel_rs::default_fingerprint(key.as_bytes()) & 1,
                1,
                "{key} forwarded from the wrong bucket"
            );
        }
    }

    #[test]
    fn test_overflow_clears_filter() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(2, &clock);

        carousel.log("1", "");
        carousel.log("3", "");
        assert_eq!(carousel.depth(), 0);
        carousel.log("5", "");

        assert_eq!(carousel.depth(), 1);
        assert_eq!(carousel.active_bucket(), 1);
        // Filter was reset, so an odd key already seen goes through again
        assert_eq!(carousel.log("1", ""), LogOutcome::Forwarded);
        assert_eq!(carousel.matching_this_phase(), 1);
    }

    #[test]
    fn test_growth_halves_eligible_keys() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(2, &clock);
        for key in ["1", "2", "3"] {
            carousel.log(key, "");
        }
        assert_eq!(carousel.depth(), 1);

        let eligible = (0..100)
            .filter(|k| carousel.is_eligible(&k.to_string()))
            .count();
        assert_eq!(eligible, 50);
        assert_eq!(carousel.log("4", ""), LogOutcome::OutOfBucket);
    }

    #[test]
    fn test_overflow_does_not_wait_for_phase_end() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(1, &clock);

        carousel.log("0", "");
        carousel.log("2", "");

        // No time has passed at all
        assert_eq!(clock.now(), 0);
        assert_eq!(carousel.depth(), 1);
    }
}

#[cfg(test)]
mod underflow_tests {
    use super::*;

    #[test]
    fn test_empty_phases_coarsen_down_to_zero() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(1, &clock);
        grow_to_depth_two(&mut carousel);

        clock.advance(INTERVAL);
        assert!(carousel.poll());
        assert_eq!(carousel.depth(), 1);
        assert_eq!(carousel.phase(), 3);

        clock.advance(INTERVAL);
        carousel.poll();
        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.mask(), 0);

        clock.advance(INTERVAL);
        carousel.poll();
        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.stats().underflows, 2);
    }

    #[test]
    fn test_hysteresis_band() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(10, &clock);

        // Eleven distinct keys: overflow to depth 1, bucket 1 active
        for key in 0..=10 {
            carousel.log(&key.to_string(), "");
        }
        assert_eq!(carousel.depth(), 1);
        assert_eq!(carousel.active_bucket(), 1);

        // 5 keys: below target but above 10 / 2.3, depth holds
        for key in [1, 3, 5, 7, 9] {
            assert_eq!(carousel.log(&key.to_string(), ""), LogOutcome::Forwarded);
        }
        clock.advance(carousel.phase_duration());
        carousel.poll();
        assert_eq!(carousel.depth(), 1);
        assert_eq!(carousel.active_bucket(), 0);

        // 4 keys: below 10 / 2.3, depth shrinks
        for key in [0, 2, 4, 6] {
            assert_eq!(carousel.log(&key.to_string(), ""), LogOutcome::Forwarded);
        }
        clock.advance(carousel.phase_duration());
        carousel.poll();
        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.matching_this_phase(), 0);
    }

    #[test]
    fn test_underflow_checked_on_next_log() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(1, &clock);
        grow_to_depth_two(&mut carousel);

        clock.advance(INTERVAL);
        // The expired phase is closed by the next event, before routing it
        let outcome = carousel.log("3", "");
        assert_eq!(carousel.depth(), 1);
        assert_eq!(carousel.phase(), 3);
        assert_eq!(outcome, LogOutcome::Forwarded);
    }
}

#[cfg(test)]
mod bucket_tests {
    use super::*;

    #[test]
    fn test_four_phases_cover_key_space_once() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(1, &clock);
        grow_to_depth_two(&mut carousel);

        let keys: Vec<String> = (0..64).map(|k: u64| k.to_string()).collect();
        let mut seen_in = vec![0usize; keys.len()];

        for _ in 0..4 {
            let eligible: Vec<usize> = (0..keys.len())
                .filter(|&i| carousel.is_eligible(&keys[i]))
                .collect();
            assert_eq!(eligible.len(), 16);
            for &i in &eligible {
                seen_in[i] += 1;
            }

            // One forward per phase keeps the load above the shrink threshold
            assert_eq!(
                carousel.log(&keys[eligible[0]], ""),
                LogOutcome::Forwarded
            );
            clock.advance(carousel.phase_duration());
            assert!(carousel.poll());
            assert_eq!(carousel.depth(), 2);
        }

        assert!(seen_in.iter().all(|&n| n == 1), "{seen_in:?}");
    }

    #[test]
    fn test_forwards_only_from_active_bucket() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(3, &clock);
        let mut rng = StdRng::seed_from_u64(42);

        for step in 0..5_000u64 {
            if step % 97 == 0 {
                clock.advance(rng.random_range(0..2 * carousel.phase_duration()));
            }
            carousel.poll();

            let key = rng.random_range(0..256u64).to_string();
            let bucket = numeric(key.as_bytes()) & carousel.mask();
            let active = carousel.phase() & carousel.mask();
            let eligible = carousel.is_eligible(&key);
            assert_eq!(eligible, bucket == active);

            match carousel.log(&key, "") {
                LogOutcome::Forwarded | LogOutcome::Duplicate => {
                    assert!(eligible)
                }
                LogOutcome::OutOfBucket => assert!(!eligible),
            }
        }
    }
}

#[cfg(test)]
mod counter_tests {
    use super::*;

    #[test]
    fn test_matching_counter_monotonic_within_phase() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(100, &clock);
        let mut last = 0;

        for key in 0..50 {
            carousel.log(&key.to_string(), "");
            carousel.log(&key.to_string(), "again");
            let now = carousel.matching_this_phase();
            assert!(now >= last);
            assert_eq!(now, key + 1);
            last = now;
        }

        clock.advance(carousel.phase_duration());
        carousel.poll();
        assert_eq!(carousel.matching_this_phase(), 0);
    }

    #[test]
    fn test_reset_returns_to_start() {
        let clock = SimulationClock::new();
        let mut carousel = create_numeric_carousel(1, &clock);
        grow_to_depth_two(&mut carousel);

        carousel.reset();

        assert_eq!(carousel.depth(), 0);
        assert_eq!(carousel.phase(), 0);
        assert_eq!(carousel.matching_this_phase(), 0);
        assert_eq!(carousel.log("3", ""), LogOutcome::Forwarded);
    }
}

#[cfg(test)]
mod wallclock_tests {
    use super::*;

    #[test]
    fn test_phase_expires_with_real_time() {
        let config = CarouselConfigBuilder::default()
            .target_size(2)
            .build()
            .unwrap();
        let mut carousel = Carousel::new(
            config,
            WallClock::new(),
            Duration::from_millis(5),
            MemorySink::new(),
        )
        .unwrap();
        assert_eq!(carousel.phase_duration(), Duration::from_millis(10));

        assert_eq!(carousel.log("a", "1"), LogOutcome::Forwarded);
        assert_eq!(carousel.log("a", "2"), LogOutcome::Duplicate);

        thread::sleep(Duration::from_millis(20));

        assert_eq!(carousel.log("a", "3"), LogOutcome::Forwarded);
        assert_eq!(carousel.phase(), 1);
    }
}

#[cfg(test)]
mod drain_tests {
    use super::*;

    #[test]
    fn test_carousel_feeding_background_worker() {
        let (sink, worker) = spawn_drain(8, Duration::ZERO).unwrap();
        let config = CarouselConfigBuilder::default()
            .target_size(8)
            .build()
            .unwrap();
        let mut carousel = Carousel::new(
            config,
            WallClock::new(),
            Duration::from_secs(60),
            sink,
        )
        .unwrap();

        for i in 0..1_000 {
            let key = format!("key-{}", i % 20);
            carousel.log(&key, "entry");
        }
        let stats = carousel.stats();
        drop(carousel.into_sink());

        let report = worker.join().unwrap();
        assert!(!report.recorded_keys.is_empty());
        assert!(report.recorded_keys.len() <= 20);
        assert_eq!(stats.forwarded, report.drained + report.rejected);
    }
}
