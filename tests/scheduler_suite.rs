use std::time::{Duration, Instant};

use warpviz::scheduler::FrameScheduler;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn first_tick_renders_immediately() {
    let mut s = FrameScheduler::new(60, 3);
    let t0 = Instant::now();
    assert_eq!(s.time_until_next(t0), Duration::ZERO);
    assert_eq!(s.tick(t0), 1);
    assert_eq!(s.frames(), 1);
    assert_eq!(s.clock().last_tick(), Some(t0));
}

#[test]
fn steady_ticks_yield_one_frame_each() {
    let mut s = FrameScheduler::new(50, 3);
    let t0 = Instant::now();
    s.tick(t0);
    for i in 1..=100u64 {
        assert_eq!(s.tick(t0 + ms(20 * i)), 1, "tick {i}");
    }
    assert_eq!(s.frames(), 101);
    assert_eq!(s.dropped(), Duration::ZERO);
}

#[test]
fn early_ticks_yield_nothing_until_an_interval_accumulates() {
    let mut s = FrameScheduler::new(50, 3);
    let t0 = Instant::now();
    s.tick(t0);
    assert_eq!(s.tick(t0 + ms(8)), 0);
    assert_eq!(s.tick(t0 + ms(16)), 0);
    assert_eq!(s.tick(t0 + ms(24)), 1);
    assert_eq!(s.clock().accumulator(), ms(4));
}

#[test]
fn a_stall_is_capped_and_the_excess_dropped() {
    let mut s = FrameScheduler::new(60, 3);
    let t0 = Instant::now();
    s.tick(t0);
    let due = s.tick(t0 + Duration::from_secs(1));
    assert_eq!(due, 3);
    assert!(s.clock().accumulator() < s.interval());
    assert!(s.dropped() > Duration::ZERO);

    // Pacing resumes normally afterwards.
    let next = t0 + Duration::from_secs(1) + s.interval();
    assert!(s.tick(next) <= 1);
}

#[test]
fn time_until_next_counts_down() {
    let mut s = FrameScheduler::new(50, 3);
    let t0 = Instant::now();
    s.tick(t0);
    assert_eq!(s.time_until_next(t0), ms(20));
    assert_eq!(s.time_until_next(t0 + ms(15)), ms(5));
    assert_eq!(s.time_until_next(t0 + ms(40)), Duration::ZERO);
}

#[test]
fn reset_restarts_the_clock() {
    let mut s = FrameScheduler::new(30, 2);
    let t0 = Instant::now();
    s.tick(t0);
    s.tick(t0 + ms(50));
    s.reset();
    assert_eq!(s.clock().accumulator(), Duration::ZERO);
    assert_eq!(s.tick(t0 + Duration::from_secs(10)), 1);
}

#[test]
fn zero_settings_are_clamped() {
    let s = FrameScheduler::new(0, 0);
    assert_eq!(s.interval(), Duration::from_secs(1));
    assert_eq!(s.max_catch_up(), 1);
}
