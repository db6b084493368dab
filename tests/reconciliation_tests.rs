//! Row reconciliation against a real SQLite store

mod common;

use common::{asia011, asia012, row, shard, Harness};
use sqlx::Row;
use mir4_leaderboard_sync::application::{ReconcileOutcome, Transition};
use mir4_leaderboard_sync::domain::{CharacterClass, Clock, MembershipScope, RankingRepository};

#[tokio::test]
async fn reconciling_twice_only_advances_checked_at() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();
    let foo = row("Foo", "Bar", 12_345, CharacterClass::Sorcerer);

    engine.reconcile(&asia011(), &foo).await.unwrap();
    let first = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();

    h.clock.advance(5);
    engine.reconcile(&asia011(), &foo).await.unwrap();
    let second = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.powerscore, 12_345);
    assert!(second.checked_at > first.checked_at);

    let clans = h.repo.list_memberships(MembershipScope::Clan, second.id).await.unwrap();
    let servers = h.repo.list_memberships(MembershipScope::Server, second.id).await.unwrap();
    assert_eq!(clans.len(), 1);
    assert_eq!(servers.len(), 1);
    assert!(!clans[0].is_leave);
    assert_eq!(clans[0].checked_at, second.checked_at);
    assert_eq!(h.repo.list_class_assignments(second.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn clan_change_closes_old_membership() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();

    engine
        .reconcile(&asia011(), &row("Foo", "A", 100, CharacterClass::Warrior))
        .await
        .unwrap();
    h.clock.advance(1);
    engine
        .reconcile(&asia011(), &row("Foo", "B", 110, CharacterClass::Warrior))
        .await
        .unwrap();

    let foo = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();
    let a = h.repo.find_clan_by_name("A").await.unwrap().unwrap();
    let b = h.repo.find_clan_by_name("B").await.unwrap().unwrap();
    let rows = h.repo.list_memberships(MembershipScope::Clan, foo.id).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].target_id, rows[0].is_leave), (a.id, true));
    assert_eq!((rows[1].target_id, rows[1].is_leave), (b.id, false));
    assert_eq!(rows[0].checked_at, foo.checked_at);
    assert_eq!(rows[1].checked_at, foo.checked_at);

    // Returning to A opens a fresh row; history is kept
    h.clock.advance(1);
    engine
        .reconcile(&asia011(), &row("Foo", "A", 120, CharacterClass::Warrior))
        .await
        .unwrap();
    let rows = h.repo.list_memberships(MembershipScope::Clan, foo.id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|m| !m.is_leave).count(), 1);
    assert_eq!(rows[2].target_id, a.id);
}

#[tokio::test]
async fn transition_reports_what_happened() {
    let h = Harness::seeded(&[asia011(), asia012()]).await;
    let engine = h.engine();
    let at = h.clock.now();
    let character = h.repo.upsert_character("Foo", 1, at).await.unwrap();
    let s1 = h.repo.find_server_by_name("ASIA011").await.unwrap().unwrap();
    let s2 = h.repo.find_server_by_name("ASIA012").await.unwrap().unwrap();

    let joined = engine
        .transition_membership(MembershipScope::Server, character.id, s1.id, at)
        .await
        .unwrap();
    let refreshed = engine
        .transition_membership(MembershipScope::Server, character.id, s1.id, at)
        .await
        .unwrap();
    let moved = engine
        .transition_membership(MembershipScope::Server, character.id, s2.id, at)
        .await
        .unwrap();

    assert_eq!(joined, Transition::Joined);
    assert_eq!(refreshed, Transition::Refreshed);
    assert_eq!(moved, Transition::Moved { from: s1.id, to: s2.id });
}

#[tokio::test]
async fn server_change_moves_membership_and_clan() {
    let h = Harness::seeded(&[asia011(), asia012()]).await;

    h.engine()
        .reconcile(&asia011(), &row("Foo", "Bar", 100, CharacterClass::Lancer))
        .await
        .unwrap();
    h.clock.advance(1);
    h.engine()
        .reconcile(&asia012(), &row("Foo", "Bar", 100, CharacterClass::Lancer))
        .await
        .unwrap();

    let foo = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();
    let servers = h.repo.list_memberships(MembershipScope::Server, foo.id).await.unwrap();
    assert_eq!(servers.len(), 2);
    assert!(servers[0].is_leave);
    assert!(!servers[1].is_leave);

    let bar = h.repo.find_clan_by_name("Bar").await.unwrap().unwrap();
    let s2 = h.repo.find_server_by_name("ASIA012").await.unwrap().unwrap();
    let active = h.repo.find_active_affiliations(bar.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].server_id, s2.id);
}

#[tokio::test]
async fn unaffiliated_clan_spans_servers() {
    let h = Harness::seeded(&[asia011(), asia012()]).await;
    let engine = h.engine();

    engine
        .reconcile(&asia011(), &row("Foo", "", 100, CharacterClass::Taoist))
        .await
        .unwrap();
    engine
        .reconcile(&asia012(), &row("Baz", "", 100, CharacterClass::Taoist))
        .await
        .unwrap();

    let no_clan = h.repo.find_clan_by_name("").await.unwrap().unwrap();
    assert_eq!(h.repo.find_active_affiliations(no_clan.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_server_drops_row() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();
    let unknown = shard(2, "EU", 201, "EU011");

    let outcome = engine
        .reconcile(&unknown, &row("Foo", "Bar", 1, CharacterClass::Warrior))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::ServerUnknown);
    assert!(h.repo.find_character_by_username("Foo").await.unwrap().is_none());
}

#[tokio::test]
async fn classes_accumulate() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();

    engine
        .reconcile(&asia011(), &row("Foo", "Bar", 1, CharacterClass::Warrior))
        .await
        .unwrap();
    engine
        .reconcile(&asia011(), &row("Foo", "Bar", 1, CharacterClass::Darkist))
        .await
        .unwrap();

    let foo = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();
    let classes: Vec<i64> = h
        .repo
        .list_class_assignments(foo.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.class_id)
        .collect();
    assert_eq!(classes, vec![1, 6]);
}

#[tokio::test]
async fn single_active_membership_holds_across_many_rows() {
    let h = Harness::seeded(&[asia011(), asia012()]).await;
    let engine = h.engine();
    let shards = [asia011(), asia012()];

    for i in 0..12_usize {
        let clan = ["A", "B", "C"][i % 3];
        engine
            .reconcile(&shards[i % 2], &row("Foo", clan, i as i64, CharacterClass::Arbalist))
            .await
            .unwrap();
        h.clock.advance(1);
    }

    let foo = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();
    for scope in [MembershipScope::Clan, MembershipScope::Server] {
        let rows = h.repo.list_memberships(scope, foo.id).await.unwrap();
        assert_eq!(rows.iter().filter(|m| !m.is_leave).count(), 1, "{scope}");
        assert_eq!(rows.len(), 12);
    }
}

#[tokio::test]
async fn page_dedupes_usernames_within_a_run() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();
    let rows = vec![
        row("Foo", "Bar", 10, CharacterClass::Warrior),
        row("Baz", "Bar", 9, CharacterClass::Warrior),
        row("Foo", "Bar", 10, CharacterClass::Warrior),
    ];

    let stats = engine.reconcile_page(&asia011(), &rows, "fake://1").await;

    assert_eq!(stats.reconciled, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.dropped, 0);
}

async fn clan_server_rows(h: &Harness) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM clan_servers")
        .fetch_one(h.db.pool())
        .await
        .unwrap()
        .get("n")
}

async fn reject_clan_memberships_for(h: &Harness, clan: &str) {
    let clan = h.repo.upsert_clan(clan, h.clock.now()).await.unwrap();
    sqlx::query(&format!(
        "CREATE TRIGGER reject_clan BEFORE INSERT ON clan_memberships WHEN NEW.clan_id = {} \
         BEGIN SELECT RAISE(ABORT, 'database is locked'); END",
        clan.id
    ))
    .execute(h.db.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn same_clan_name_on_two_servers_does_not_churn() {
    let h = Harness::seeded(&[asia011(), asia012()]).await;
    let mut counts = Vec::new();

    for _ in 0..5 {
        let engine = h.engine();
        engine
            .reconcile(&asia011(), &row("Foo", "Bar", 100, CharacterClass::Warrior))
            .await
            .unwrap();
        h.clock.advance(1);
        engine
            .reconcile(&asia012(), &row("Baz", "Bar", 100, CharacterClass::Warrior))
            .await
            .unwrap();
        h.clock.advance(1);
        counts.push(clan_server_rows(&h).await);
    }

    assert_eq!(counts, vec![2, 2, 2, 2, 2]);
    let bar = h.repo.find_clan_by_name("Bar").await.unwrap().unwrap();
    assert_eq!(h.repo.find_active_affiliations(bar.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_clan_move_keeps_active_membership() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();
    engine
        .reconcile(&asia011(), &row("Foo", "A", 100, CharacterClass::Warrior))
        .await
        .unwrap();
    reject_clan_memberships_for(&h, "B").await;
    h.clock.advance(1);

    let result = engine
        .reconcile(&asia011(), &row("Foo", "B", 110, CharacterClass::Warrior))
        .await;
    assert!(result.is_err());

    let foo = h.repo.find_character_by_username("Foo").await.unwrap().unwrap();
    let a = h.repo.find_clan_by_name("A").await.unwrap().unwrap();
    let rows = h.repo.list_memberships(MembershipScope::Clan, foo.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].target_id, rows[0].is_leave), (a.id, false));
}

#[tokio::test]
async fn failed_row_is_retried_later_in_the_run() {
    let h = Harness::seeded(&[asia011()]).await;
    let engine = h.engine();
    reject_clan_memberships_for(&h, "Bar").await;
    let rows = vec![row("Foo", "Bar", 10, CharacterClass::Warrior)];

    let failed = engine.reconcile_page(&asia011(), &rows, "fake://2").await;
    assert_eq!((failed.reconciled, failed.dropped, failed.duplicates), (0, 1, 0));

    sqlx::query("DROP TRIGGER reject_clan").execute(h.db.pool()).await.unwrap();
    let retried = engine.reconcile_page(&asia011(), &rows, "fake://1").await;
    assert_eq!((retried.reconciled, retried.dropped, retried.duplicates), (1, 0, 0));

    let again = engine.reconcile_page(&asia011(), &rows, "fake://1").await;
    assert_eq!(again.duplicates, 1);
}
