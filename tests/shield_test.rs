mod helpers;

use helpers::{date, streak, TestApp};
use vigil::checkin::CheckInKind;
use vigil::repository::CheckInRepository;
use vigil::session::{ServiceError, Turn};
use vigil::streak::{StreakError, StreakEvent};

#[test]
fn shield_bridges_one_missed_day() {
    // Last check-in on the 8th, the 9th was missed, today is the 10th.
    let app = TestApp::new("2026-03-10T19:30:00Z");
    app.seed_user("u1", "UTC", streak(12, 12, "2026-03-08", 20));
    app.db
        .lock()
        .unwrap()
        .execute("UPDATE users SET streak_shields = 1 WHERE user_id = 'u1'", [])
        .unwrap();

    let outcome = app.service.use_shield("u1").unwrap();
    assert_eq!(outcome.covered_date, date("2026-03-09"));
    assert_eq!(outcome.shields_remaining, 0);

    app.service.start("u1", CheckInKind::Full).unwrap();
    let Turn::Completed(report) = app.full_checkin("u1", 6) else {
        panic!("check-in did not complete");
    };
    assert_eq!(report.outcome.state.current_streak, 13);
    assert!(!report.outcome.was_reset());
    // Shields are not check-ins.
    assert_eq!(report.outcome.state.total_checkins, 21);
}

#[test]
fn shield_refused_when_not_needed_or_too_late() {
    let app = TestApp::new("2026-03-10T19:30:00Z");
    app.seed_user("fresh", "UTC", streak(3, 3, "2026-03-09", 3));
    app.seed_user("late", "UTC", streak(3, 3, "2026-03-06", 3));
    app.seed_user("empty", "UTC", streak(3, 3, "2026-03-08", 3));
    app.seed_user("new", "UTC", Default::default());

    assert!(matches!(
        app.service.use_shield("fresh"),
        Err(ServiceError::Streak(StreakError::ShieldNotNeeded { .. }))
    ));
    assert!(matches!(
        app.service.use_shield("late"),
        Err(ServiceError::Streak(StreakError::StreakAlreadyBroken { missed_days: 3 }))
    ));
    assert!(matches!(
        app.service.use_shield("empty"),
        Err(ServiceError::Streak(StreakError::NoShieldsLeft))
    ));
    assert!(matches!(
        app.service.use_shield("new"),
        Err(ServiceError::Streak(StreakError::NoPriorCheckIn))
    ));
}

#[test]
fn seventh_day_earns_a_shield() {
    let app = TestApp::new("2026-03-10T19:30:00Z");
    app.seed_user("u1", "UTC", streak(6, 6, "2026-03-09", 6));

    app.service.start("u1", CheckInKind::Full).unwrap();
    let Turn::Completed(report) = app.full_checkin("u1", 6) else {
        panic!("check-in did not complete");
    };
    assert!(report
        .outcome
        .events
        .iter()
        .any(|e| matches!(e, StreakEvent::ShieldEarned { shields: 1 })));
    assert_eq!(app.repo.load_profile("u1").unwrap().unwrap().streak_shields, 1);
}
