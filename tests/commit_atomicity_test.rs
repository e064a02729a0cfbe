mod helpers;

use chrono::Utc;
use helpers::{date, utc};
use std::sync::Arc;
use vigil::checkin::{CheckInKind, ChecklistItem, FixedClock};
use vigil::feedback::TemplateFeedback;
use vigil::repository::{CheckInRepository, InMemoryRepository, RepositoryError, UserProfile};
use vigil::session::{CheckInService, InMemorySessionStore, ServiceError, ServiceSettings, Turn};

fn memory_service(repo: Arc<InMemoryRepository>) -> CheckInService {
    CheckInService::new(
        repo,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(FixedClock::new(utc("2026-03-10T19:30:00Z"))),
        Arc::new(TemplateFeedback),
        ServiceSettings::default(),
    )
}

fn finish_quick(service: &CheckInService) -> Result<Turn, ServiceError> {
    service.start("u1", CheckInKind::Abbreviated).unwrap();
    let mut last = None;
    for item in ChecklistItem::ALL {
        last = Some(service.reply("u1", &format!("{}_yes", item.key()))?);
    }
    Ok(last.unwrap())
}

#[test]
fn failure_between_writes_leaves_nothing_behind() {
    let repo = Arc::new(InMemoryRepository::new());
    repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
    let service = memory_service(repo.clone());

    repo.fail_between_writes(true);
    let err = finish_quick(&service).unwrap_err();
    assert!(matches!(err, ServiceError::CommitFailed(_)), "{err:?}");

    assert!(!repo.checkin_exists("u1", date("2026-03-10")).unwrap());
    let profile = repo.load_profile("u1").unwrap().unwrap();
    assert_eq!(profile.streak, Default::default());

    // The computed result is kept and can be committed unchanged.
    repo.fail_between_writes(false);
    let report = service.retry_commit("u1").unwrap();
    assert_eq!(report.checkin.date, date("2026-03-10"));
    assert!(repo.checkin_exists("u1", date("2026-03-10")).unwrap());
    assert_eq!(repo.load_profile("u1").unwrap().unwrap().streak.total_checkins, 1);
}

#[test]
fn pending_result_can_be_discarded() {
    let repo = Arc::new(InMemoryRepository::new());
    repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
    let service = memory_service(repo.clone());

    repo.fail_between_writes(true);
    finish_quick(&service).unwrap_err();

    assert!(service.status("u1").unwrap().session.unwrap().commit_pending);
    assert_eq!(service.reply("u1", "cancel").unwrap(), Turn::Cancelled);
    assert!(service.status("u1").unwrap().session.is_none());
    assert!(matches!(
        service.retry_commit("u1"),
        Err(ServiceError::NoPendingCommit(_))
    ));
}

#[test]
fn shield_mid_session_then_replayed_commit_conflicts() {
    let repo = Arc::new(InMemoryRepository::new());
    let mut profile = UserProfile::new("u1", "UTC", Utc::now());
    profile.streak.last_checkin_date = Some(date("2026-03-08"));
    profile.streak.current_streak = 3;
    profile.streak.longest_streak = 3;
    profile.streak.total_checkins = 3;
    profile.streak_shields = 1;
    repo.create_profile(&profile).unwrap();
    let service = memory_service(repo.clone());

    service.start("u1", CheckInKind::Abbreviated).unwrap();
    for item in &ChecklistItem::ALL[..5] {
        service.reply("u1", &format!("{}_yes", item.key())).unwrap();
    }
    // The streak is advanced from the stored state at completion time.
    service.use_shield("u1").unwrap();
    let turn = service.reply("u1", "boundaries_yes").unwrap();
    let Turn::Completed(report) = turn else {
        panic!("expected completion");
    };
    assert_eq!(report.outcome.state.current_streak, 4);
    assert!(matches!(
        repo.commit(&report.checkin, &report.outcome),
        Err(RepositoryError::Conflict(_))
    ));
}
