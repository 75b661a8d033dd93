//! Tests for the gamification façade against an in-memory store.

mod common;

use common::{
    badge, days_ago, harness, level_row, points_row, streak_row, test_now, today,
};
use study_tracker_core::{
    BadgeEvent, GamificationError, PortError, StreakBackfill, UserBadge, UserStreak,
};
use uuid::Uuid;

//=========================================================================================
// Profile
//=========================================================================================

#[tokio::test]
async fn test_ensure_profile_creates_zero_state_rows() {
    let h = harness();
    assert!(h.service.ensure_user_profile_exists(h.user).await);

    let level = h.store.level(h.user).unwrap();
    assert_eq!((level.level, level.experience_points, level.next_level_xp), (0, 0, 100));
    assert_eq!(h.store.points(h.user).unwrap().points, 0);
    let streak = h.store.streak(h.user).unwrap();
    assert_eq!(streak.current_streak, 0);
    assert_eq!(streak.last_activity_date, None);
}

#[tokio::test]
async fn test_ensure_profile_is_idempotent() {
    let h = harness();
    h.store.put_points(points_row(h.user, 42));

    assert!(h.service.ensure_user_profile_exists(h.user).await);
    assert!(h.service.ensure_user_profile_exists(h.user).await);
    assert_eq!(h.store.points(h.user).unwrap().points, 42);
}

#[tokio::test]
async fn test_ensure_profile_backfills_legacy_streak_columns() {
    let h = harness();
    let gaps = StreakBackfill {
        last_streak_bonus_day: true,
        longest_study_hours_streak: false,
        current_total_study_hours_in_streak: true,
    };
    h.store
        .put_legacy_streak(streak_row(h.user, 3, Some(days_ago(1)), 0), gaps);

    assert!(h.service.ensure_user_profile_exists(h.user).await);
    assert!(h.store.streak_gaps(h.user).unwrap().is_empty());
    assert_eq!(h.store.streak(h.user).unwrap().current_streak, 3);
}

#[tokio::test]
async fn test_ensure_profile_reports_failure_but_still_creates_others() {
    let h = harness();
    h.store.fail_on("insert_level");

    assert!(!h.service.ensure_user_profile_exists(h.user).await);
    assert!(h.store.level(h.user).is_none());
    assert!(h.store.points(h.user).is_some());
    assert!(h.store.streak(h.user).is_some());
}

#[tokio::test]
async fn test_nil_user_is_rejected() {
    let h = harness();
    assert!(!h.service.ensure_user_profile_exists(Uuid::nil()).await);
    let err = h.service.add_points(Uuid::nil(), 5, "test").await.unwrap_err();
    assert!(matches!(err, GamificationError::InvalidInput(_)));
}

//=========================================================================================
// Points
//=========================================================================================

#[tokio::test]
async fn test_add_points_converts_first_ten_into_xp() {
    let h = harness();
    let outcome = h.service.add_points(h.user, 10, "test").await.unwrap();

    assert_eq!(outcome.points, 10);
    assert_eq!(outcome.xp_gained, 20);
    let level = h.store.level(h.user).unwrap();
    assert_eq!(level.level, 0);
    assert_eq!(level.experience_points, 20);
    assert_eq!(level.next_level_xp, 100);
}

#[tokio::test]
async fn test_points_conversion_is_boundary_triggered() {
    let cases = [(8, 1, 0), (9, 1, 20), (5, 25, 60)];
    for (current, delta, expected_xp) in cases {
        let h = harness();
        h.store.put_points(points_row(h.user, current));

        let outcome = h.service.add_points(h.user, delta, "test").await.unwrap();
        assert_eq!(outcome.points, current + delta);
        assert_eq!(outcome.xp_gained, expected_xp, "from {} adding {}", current, delta);
        assert_eq!(h.store.level(h.user).unwrap().experience_points, expected_xp);
    }
}

#[tokio::test]
async fn test_zero_delta_is_invalid() {
    let h = harness();
    let err = h.service.add_points(h.user, 0, "nothing").await.unwrap_err();
    assert!(matches!(err, GamificationError::InvalidInput(_)));
    let err = h.service.add_xp(h.user, 0, "nothing").await.unwrap_err();
    assert!(matches!(err, GamificationError::InvalidInput(_)));
}

#[tokio::test]
async fn test_failed_points_write_skips_xp_conversion() {
    let h = harness();
    h.service.ensure_user_profile_exists(h.user).await;
    h.store.fail_on("update_points");

    let err = h.service.add_points(h.user, 10, "test").await.unwrap_err();
    assert!(matches!(err, GamificationError::Port(PortError::Unexpected(_))));
    assert_eq!(h.store.level(h.user).unwrap().experience_points, 0);
}

#[tokio::test]
async fn test_points_write_retries_on_conflict() {
    let h = harness();
    h.service.ensure_user_profile_exists(h.user).await;
    h.store.conflict_on("update_points", 2);

    let outcome = h.service.add_points(h.user, 3, "test").await.unwrap();
    assert_eq!(outcome.points, 3);
    assert_eq!(h.store.points(h.user).unwrap().points, 3);
}

#[tokio::test]
async fn test_points_conflict_surfaces_after_retries_are_spent() {
    let h = harness();
    h.service.ensure_user_profile_exists(h.user).await;
    h.store.conflict_on("update_points", 10);

    let err = h.service.add_points(h.user, 3, "test").await.unwrap_err();
    assert!(matches!(err, GamificationError::Port(PortError::Conflict(_))));
    assert_eq!(h.store.points(h.user).unwrap().points, 0);
}

#[tokio::test]
async fn test_stale_version_is_rejected_by_store() {
    let h = harness();
    h.service.add_points(h.user, 1, "first").await.unwrap();
    let stale = points_row(h.user, 99);
    use study_tracker_core::GamificationStore;
    let err = h.store.update_points(&stale).await.unwrap_err();
    assert!(matches!(err, PortError::Conflict(_)));
}

#[tokio::test]
async fn test_negative_points_floor_at_zero() {
    let h = harness();
    let outcome = h.service.add_points(h.user, -5, "penalty").await.unwrap();
    assert_eq!(outcome.points, 0);
    assert_eq!(outcome.xp_gained, 0);
    assert_eq!(h.store.points(h.user).unwrap().points, 0);

    h.store.put_points(points_row(h.user, 12));
    let outcome = h.service.add_points(h.user, -20, "penalty").await.unwrap();
    assert_eq!(outcome.points, 0);
    assert_eq!(h.store.level(h.user).unwrap().experience_points, 0);
}

#[tokio::test]
async fn test_out_of_range_points_are_rejected_before_writing() {
    let h = harness();
    h.store.put_points(points_row(h.user, 5));

    let err = h.service.add_points(h.user, i64::MAX, "big").await.unwrap_err();
    assert!(matches!(err, GamificationError::InvalidInput(_)));
    let points = h.store.points(h.user).unwrap();
    assert_eq!((points.points, points.version), (5, 0));
    assert_eq!(h.store.level(h.user).unwrap().experience_points, 0);
}

#[tokio::test]
async fn test_huge_points_total_keeps_level_state_valid() {
    let h = harness();
    let outcome = h.service.add_points(h.user, i64::MAX, "big").await.unwrap();
    assert_eq!(outcome.points, i64::MAX);

    let level = h.store.level(h.user).unwrap();
    assert!(level.experience_points < level.next_level_xp);
}

//=========================================================================================
// XP and levels
//=========================================================================================

#[tokio::test]
async fn test_out_of_range_xp_is_rejected_before_writing() {
    let h = harness();
    h.store.put_level(level_row(h.user, 0, 50, 100));

    let err = h.service.add_xp(h.user, i64::MAX, "big").await.unwrap_err();
    assert!(matches!(err, GamificationError::InvalidInput(_)));
    let level = h.store.level(h.user).unwrap();
    assert_eq!(
        (level.level, level.experience_points, level.next_level_xp, level.version),
        (0, 50, 100, 0)
    );
}

#[tokio::test]
async fn test_add_xp_single_level_up() {
    let h = harness();
    h.store.put_level(level_row(h.user, 0, 90, 100));

    let outcome = h.service.add_xp(h.user, 30, "test").await.unwrap();
    assert_eq!(outcome.level, 1);
    assert_eq!(outcome.xp, 20);
    assert_eq!(outcome.next_level_xp, 200);
    assert!(outcome.leveled_up);
}

#[tokio::test]
async fn test_add_xp_multiple_level_ups() {
    let h = harness();
    h.store.put_level(level_row(h.user, 0, 90, 100));

    let outcome = h.service.add_xp(h.user, 250, "test").await.unwrap();
    assert_eq!(outcome.level, 2);
    assert_eq!(outcome.xp, 40);
    assert_eq!(outcome.next_level_xp, 300);
    assert!(outcome.leveled_up);

    let stored = h.store.level(h.user).unwrap();
    assert_eq!((stored.level, stored.experience_points, stored.next_level_xp), (2, 40, 300));
}

#[tokio::test]
async fn test_xp_rollover_never_leaves_overflow() {
    let h = harness();
    for delta in [15, 85, 199, 1, 640, 2_500, 3] {
        let outcome = h.service.add_xp(h.user, delta, "grind").await.unwrap();
        assert!(outcome.xp < outcome.next_level_xp);
        assert_eq!(outcome.next_level_xp, 100 * (outcome.level as i64 + 1));
    }
}

#[tokio::test]
async fn test_add_xp_fails_when_level_row_cannot_be_created() {
    let h = harness();
    h.store.fail_on("insert_level");

    let err = h.service.add_xp(h.user, 10, "test").await.unwrap_err();
    assert!(matches!(err, GamificationError::Port(PortError::NotFound(_))));
}

//=========================================================================================
// Streaks
//=========================================================================================

#[tokio::test]
async fn test_streak_continuation_pays_five_day_bonus_once() {
    let h = harness();
    let mut row = streak_row(h.user, 4, Some(days_ago(1)), 0);
    row.current_total_study_hours_in_streak = 2.5;
    h.store.put_streak(row);

    let outcome = h.service.update_streak(h.user, true, 60).await.unwrap();
    assert_eq!(outcome.current_streak, 5);
    assert_eq!(outcome.bonus_points, 5);
    assert_eq!(h.store.points(h.user).unwrap().points, 5);

    let stored = h.store.streak(h.user).unwrap();
    assert_eq!(stored.last_streak_bonus_day, 5);
    assert_eq!(stored.last_activity_date, Some(today()));
    assert_eq!(stored.current_total_study_hours_in_streak, 3.5);

    let again = h.service.update_streak(h.user, true, 0).await.unwrap();
    assert_eq!(again.current_streak, 5);
    assert_eq!(again.bonus_points, 0);
    assert_eq!(h.store.points(h.user).unwrap().points, 5);
}

#[tokio::test]
async fn test_streak_break_resets_milestone_eligibility() {
    let h = harness();
    h.store.put_streak(streak_row(h.user, 6, Some(days_ago(3)), 5));

    let outcome = h.service.update_streak(h.user, false, 0).await.unwrap();
    assert_eq!(outcome.current_streak, 0);
    assert_eq!(outcome.longest_streak, 6);
    let stored = h.store.streak(h.user).unwrap();
    assert_eq!(stored.last_streak_bonus_day, 0);
    assert_eq!(stored.current_total_study_hours_in_streak, 0.0);

    // Five consecutive days later the first milestone pays again.
    let mut bonus = 0;
    for day in 0..5 {
        if day > 0 {
            h.clock.advance_days(1);
        }
        bonus += h.service.update_streak(h.user, true, 30).await.unwrap().bonus_points;
    }
    assert_eq!(h.store.streak(h.user).unwrap().current_streak, 5);
    assert_eq!(bonus, 5);
}

#[tokio::test]
async fn test_no_study_within_grace_leaves_streak_alone() {
    let h = harness();
    h.store.put_streak(streak_row(h.user, 3, Some(days_ago(1)), 0));

    let outcome = h.service.update_streak(h.user, false, 0).await.unwrap();
    assert_eq!(outcome.current_streak, 3);
    assert_eq!(h.store.streak(h.user).unwrap().version, 0);
}

#[tokio::test]
async fn test_seven_day_streak_pays_seven_points() {
    let h = harness();
    h.store.put_streak(streak_row(h.user, 6, Some(days_ago(1)), 5));

    let outcome = h.service.update_streak(h.user, true, 0).await.unwrap();
    assert_eq!(outcome.current_streak, 7);
    assert_eq!(outcome.bonus_points, 7);
    assert_eq!(outcome.longest_streak, 7);
    assert_eq!(h.store.points(h.user).unwrap().points, 7);
}

#[tokio::test]
async fn test_streak_bonus_failure_keeps_streak() {
    let h = harness();
    h.store.put_streak(streak_row(h.user, 4, Some(days_ago(1)), 0));
    h.service.ensure_user_profile_exists(h.user).await;
    h.store.fail_on("update_points");

    let outcome = h.service.update_streak(h.user, true, 0).await.unwrap();
    assert_eq!(outcome.current_streak, 5);
    assert_eq!(outcome.bonus_points, 0);
}

#[tokio::test]
async fn test_streak_write_failure_is_returned() {
    let h = harness();
    h.service.ensure_user_profile_exists(h.user).await;
    h.store.fail_on("update_streak");

    let err = h.service.update_streak(h.user, true, 0).await.unwrap_err();
    assert!(matches!(err, GamificationError::Port(PortError::Unexpected(_))));
}

//=========================================================================================
// Badges
//=========================================================================================

#[tokio::test]
async fn test_badge_award_is_idempotent() {
    let h = harness();
    h.store.add_badge(badge("Boas-vindas"));

    let first = h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await;
    let second = h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await;

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(h.store.user_badges(h.user).len(), 1);
}

#[tokio::test]
async fn test_badge_won_by_a_concurrent_check_is_not_reported() {
    let h = harness();
    let raced = badge("Boas-vindas");
    let mine = badge("Aprendiz");
    h.store.add_badge(raced.clone());
    h.store.add_badge(mine.clone());
    h.store.race_badge_award(UserBadge {
        user_id: h.user,
        badge_id: raced.id,
        earned_at: test_now(),
    });

    let awarded = h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await;
    assert_eq!(awarded.len(), 1);
    assert_eq!(awarded[0].badge_id, mine.id);
    assert_eq!(h.store.user_badges(h.user).len(), 2);
}

#[tokio::test]
async fn test_xp_threshold_badge_awarded_by_points() {
    let h = harness();
    let mut b = badge("Aprendiz");
    b.xp_required = Some(40);
    let id = b.id;
    h.store.add_badge(b);

    let outcome = h.service.add_points(h.user, 10, "test").await.unwrap();
    assert!(outcome.awarded_badges.is_empty());

    let outcome = h.service.add_points(h.user, 10, "test").await.unwrap();
    assert_eq!(outcome.awarded_badges.len(), 1);
    assert_eq!(outcome.awarded_badges[0].badge_id, id);
}

#[tokio::test]
async fn test_named_rules_apply() {
    let h = harness();
    h.store.add_badge(badge("Primeiro Passo"));
    h.store.add_badge(badge("Subindo a Montanha"));

    assert!(h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await.is_empty());

    h.store.set_activity(h.user, 0, 1, true);
    let awarded = h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await;
    assert_eq!(awarded.len(), 1);

    // Level 4 with 0 XP means 1000 lifetime XP.
    h.store.put_level(level_row(h.user, 4, 0, 500));
    let awarded = h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await;
    assert_eq!(awarded.len(), 1);
    assert_eq!(h.store.user_badges(h.user).len(), 2);
}

#[tokio::test]
async fn test_badge_failure_never_blocks_points() {
    let h = harness();
    h.store.add_badge(badge("Boas-vindas"));
    h.store.fail_on("list_badges");

    let outcome = h.service.add_points(h.user, 1, "checklist").await.unwrap();
    assert_eq!(outcome.points, 1);
    assert!(outcome.awarded_badges.is_empty());
    assert!(h.store.user_badges(h.user).is_empty());
}

#[tokio::test]
async fn test_generic_event_triggers_badge_check() {
    let h = harness();
    let mut b = badge("Leitor Voraz");
    b.flashcards_reviewed_required = Some(100);
    h.store.add_badge(b);
    h.store.set_activity(h.user, 100, 0, false);

    let awarded = h
        .service
        .record_generic_event(
            h.user,
            "deck_imported",
            serde_json::json!({ "cards": 100 }),
            "import",
        )
        .await;
    assert_eq!(awarded.len(), 1);
}

//=========================================================================================
// Reset and summary
//=========================================================================================

#[tokio::test]
async fn test_reset_zeroes_stats_and_keeps_badges() {
    let h = harness();
    h.store.add_badge(badge("Boas-vindas"));
    h.store.put_points(points_row(h.user, 57));
    h.store.put_level(level_row(h.user, 3, 120, 400));
    let mut streak = streak_row(h.user, 6, Some(today()), 5);
    streak.current_total_study_hours_in_streak = 9.0;
    streak.longest_study_hours_streak = 11.0;
    h.store.put_streak(streak);
    h.service.check_and_award_badges(h.user, BadgeEvent::Manual).await;

    h.service.reset_user_gamification_stats(h.user).await.unwrap();

    assert_eq!(h.store.points(h.user).unwrap().points, 0);
    let level = h.store.level(h.user).unwrap();
    assert_eq!((level.level, level.experience_points, level.next_level_xp), (0, 0, 100));
    let streak: UserStreak = h.store.streak(h.user).unwrap();
    assert_eq!(streak.current_streak, 0);
    assert_eq!(streak.longest_streak, 0);
    assert_eq!(streak.last_activity_date, None);
    assert_eq!(streak.last_streak_bonus_day, 0);
    assert_eq!(streak.longest_study_hours_streak, 0.0);
    assert_eq!(h.store.user_badges(h.user).len(), 1);
}

#[tokio::test]
async fn test_reset_failure_is_reported() {
    let h = harness();
    h.store.fail_on("reset_stats");
    let err = h.service.reset_user_gamification_stats(h.user).await.unwrap_err();
    assert!(matches!(err, GamificationError::Port(_)));
}

#[tokio::test]
async fn test_summary_marks_earned_badges() {
    let h = harness();
    let earned = badge("Boas-vindas");
    let mut locked = badge("Maratonista");
    locked.streak_required = Some(30);
    locked.is_secret = true;
    let earned_id = earned.id;
    h.store.add_badge(earned);
    h.store.add_badge(locked);

    h.service.add_points(h.user, 12, "test").await.unwrap();
    let summary = h.service.summary(h.user).await.unwrap();

    assert_eq!(summary.points.points, 12);
    assert_eq!(summary.level.experience_points, 20);
    assert_eq!(summary.badges.len(), 2);
    for status in &summary.badges {
        assert_eq!(status.earned_at.is_some(), status.badge.id == earned_id);
    }
}
