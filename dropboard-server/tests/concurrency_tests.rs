//! Concurrent writers against a file-backed database

use std::collections::HashSet;
use std::sync::Arc;

use dropboard_common::config::Config;
use dropboard_common::db::init_database;
use dropboard_common::models::{AnalysisTriple, LeaderboardWindow};
use dropboard_common::Error;
use dropboard_server::DropService;
use tempfile::TempDir;

async fn file_service() -> (Arc<DropService>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("dropboard.db")).await.unwrap();
    let service = DropService::from_config(pool, &Config::default()).unwrap();
    (Arc::new(service), dir)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_room_creation_yields_unique_codes() {
    let (service, _dir) = file_service().await;
    let owner_id = service.register_user("builder").await.unwrap().id;

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create_room(owner_id, None).await })
        })
        .collect();

    let mut codes = HashSet::new();
    for handle in handles {
        let room = handle.await.unwrap().unwrap();
        assert!(codes.insert(room.code), "Duplicate room code issued");
    }
    assert_eq!(codes.len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_all_recorded() {
    let (service, _dir) = file_service().await;
    let owner = service.register_user("owner").await.unwrap();
    let room = service.create_room(owner.id, None).await.unwrap();

    let mut users = vec![owner.id];
    for i in 0..4 {
        let user = service.register_user(&format!("player{i}")).await.unwrap();
        service.join_room(&room.code, user.id).await.unwrap();
        users.push(user.id);
    }

    let room_id = room.id;
    let mut handles = Vec::new();
    for user_id in &users {
        for n in 1..=5i64 {
            let service = service.clone();
            let user_id = *user_id;
            handles.push(tokio::spawn(async move {
                service
                    .submit(room_id, user_id, AnalysisTriple::new(n * 5, n * 5, n * 5), None)
                    .await
            }));
        }
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(ids.insert(result.id), "Duplicate submission id");
    }

    assert_eq!(service.list_submissions(room.id, None).await.unwrap().len(), 25);
    let board = service.get_leaderboard(room.id, LeaderboardWindow::AllTime).await.unwrap();
    assert_eq!(board.len(), 5);
    // Every player submitted 15+30+45+60+75
    assert!(board.iter().all(|entry| entry.score == 225 && entry.submission_count == 5));
    let ranks: Vec<u32> = board.iter().map(|entry| entry.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

    for user_id in &users {
        let user = service.get_user(*user_id).await.unwrap();
        assert_eq!(user.total_submissions, 5);
        assert_eq!(user.best_score, 75);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stored_counters_survive_concurrent_submits_by_one_user() {
    let (service, _dir) = file_service().await;
    let owner = service.register_user("hammer").await.unwrap();
    let room = service.create_room(owner.id, None).await.unwrap();

    let (owner_id, room_id) = (owner.id, room.id);
    let per_round = 20u32;
    for round in 1..=5u32 {
        let handles: Vec<_> = (1..=per_round as i64)
            .map(|n| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .submit(room_id, owner_id, AnalysisTriple::new(n, n, n), None)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Read the row directly; a profile read would recompute it
        let user = service.get_user(owner_id).await.unwrap();
        assert_eq!(user.total_submissions, round * per_round, "round {round}");
        assert_eq!(user.best_score, 3 * per_round);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_of_one_name() {
    let (service, _dir) = file_service().await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = service.clone();
            let name = if i % 2 == 0 { "Racer" } else { "racer" };
            tokio::spawn(async move { service.register_user(name).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(Error::DuplicateUsername(_)) => {}
            Err(other) => panic!("Unexpected error: {:?}", other),
        }
    }
    assert_eq!(created, 1);
}
