mod support;

use artpool_core::error::PoolError;
use artpool_core::{Orchestrator, PoolManager};
use artpool_model::ItemId;

use support::{Harness, poster};

#[tokio::test]
async fn list_and_inspect_pools() {
    let harness = Harness::new();
    let filled = harness.add_movie("Heat (1995)");
    let untouched = harness.add_movie("Ronin (1998)");
    harness.offer(&filled, 3);
    std::fs::remove_dir_all(harness.content_dir(&untouched)).expect("remove folder");

    let ctx = harness.context(harness.config(3));
    Orchestrator::new(ctx.clone()).run().await.expect("run");
    let manager = PoolManager::new(ctx);

    let pools = manager.list_pools().await.expect("list");
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].item_id, filled.id);
    assert_eq!(pools[0].members, 3);
    assert!(!pools[0].locked);
    assert!(pools[0].last_rotated.is_some());

    let details = manager.pool_details(&filled.id).await.expect("details");
    assert_eq!(details.members.len(), 3);
    assert_eq!(details.cursor, Some(2));
    assert!(!details.custom_order);
    assert!(details.members.iter().all(|m| m.fingerprint.as_deref().is_some_and(|fp| fp.len() == 16)));
    assert!(details.members.iter().all(|m| m.language.as_deref() == Some("unknown")));

    let missing = manager.pool_details(&ItemId::new("nope")).await;
    assert!(matches!(missing, Err(PoolError::NotFound(_))));
}

#[tokio::test]
async fn add_and_remove_members_keep_side_files_in_step() {
    let harness = Harness::new();
    let item = harness.add_movie("Alien (1979)");
    let manager = PoolManager::new(harness.context(harness.config(3)));

    let bytes = poster(11, 40, 60);
    let name = manager
        .add_member(&item.id, &bytes, Some("EN"))
        .await
        .expect("add member");
    assert!(name.starts_with("pool_") && name.ends_with(".png"));
    assert_eq!(harness.member_names(&item), vec![name.clone()]);

    let duplicate = manager.add_member(&item.id, &bytes, None).await;
    assert!(matches!(duplicate, Err(PoolError::InvalidMedia(_))));

    let not_an_image = manager.add_member(&item.id, b"<html>oops</html>", None).await;
    assert!(not_an_image.is_err());

    let details = manager.pool_details(&item.id).await.expect("details");
    assert_eq!(details.members[0].language.as_deref(), Some("en"));

    manager.remove_member(&item.id, &name).await.expect("remove");
    assert!(harness.member_names(&item).is_empty());
    let pool_dir = harness.pool_dir(&item);
    let languages = std::fs::read_to_string(pool_dir.join("pool_languages.json")).expect("languages");
    let hashes = std::fs::read_to_string(pool_dir.join("pool_hashes.json")).expect("hashes");
    assert!(!languages.contains(&name));
    assert!(!hashes.contains(&name));

    let traversal = manager.remove_member(&item.id, "../Alien (1979).mkv").await;
    assert!(traversal.is_err());
    assert!(item.content_path.exists());
}

#[tokio::test]
async fn reorder_drives_sequential_rotation() {
    let harness = Harness::new();
    let item = harness.add_movie("Ran (1985)");
    harness.offer(&item, 3);
    let ctx = harness.context(harness.config(3));
    let orchestrator = Orchestrator::new(ctx.clone());
    let manager = PoolManager::new(ctx);

    orchestrator.run().await.expect("fill");
    let members = harness.member_names(&item);
    let custom = vec![members[2].clone(), members[0].clone(), members[1].clone()];
    manager.reorder(&item.id, custom.clone()).await.expect("reorder");

    let details = manager.pool_details(&item.id).await.expect("details");
    assert!(details.custom_order);
    let ordered: Vec<_> = details.members.iter().map(|m| m.name.clone()).collect();
    assert_eq!(ordered, custom);

    // Cursor is 2 after the first run, so the next pick is custom[2].
    let summary = orchestrator.run().await.expect("second run");
    assert_eq!(
        summary.items[0].outcome,
        artpool_model::ItemOutcome::Rotated {
            member: custom[2].clone(),
            added: 0,
            topped_up: false,
        }
    );

    let unknown = manager.reorder(&item.id, vec!["pool_1.jpg".into()]).await;
    assert!(matches!(unknown, Err(PoolError::NotFound(_))));
}

#[tokio::test]
async fn force_promote_ignores_cooldown_and_moves_the_cursor() {
    let harness = Harness::new();
    let item = harness.add_movie("Solaris (1972)");
    harness.offer(&item, 3);
    let config = artpool_model::PoolConfig {
        min_hours_between_switches: 48.0,
        ..harness.config(3)
    };
    let ctx = harness.context(config);
    Orchestrator::new(ctx.clone()).run().await.expect("fill");
    let manager = PoolManager::new(ctx.clone());
    let members = harness.member_names(&item);

    let promotion = manager
        .force_promote(&item.id, Some(&members[0]))
        .await
        .expect("promote named member");
    assert_eq!(promotion.member, members[0]);
    assert_eq!(promotion.destination, harness.content_dir(&item).join("poster.png"));
    assert_eq!(
        std::fs::read(&promotion.destination).expect("poster"),
        std::fs::read(harness.pool_dir(&item).join(&members[0])).expect("member")
    );
    assert_eq!(ctx.rotation_state.get(&item.id).await.cursor, Some(1));

    let next = manager.force_promote(&item.id, None).await.expect("promote next");
    assert_eq!(next.member, members[1]);
    assert_eq!(ctx.rotation_state.get(&item.id).await.cursor, Some(2));
}

#[tokio::test]
async fn purge_removes_pools_and_state() {
    let harness = Harness::new();
    let first = harness.add_movie("First (2010)");
    let second = harness.add_movie("Second (2011)");
    harness.offer(&first, 2);
    harness.offer(&second, 2);
    let ctx = harness.context(harness.config(2));
    Orchestrator::new(ctx.clone()).run().await.expect("fill");
    let manager = PoolManager::new(ctx.clone());

    let report = manager.purge_all().await.expect("purge");
    assert_eq!(report.pools_removed, 2);
    assert!(report.state_cleared);
    assert!(!harness.pool_dir(&first).exists());
    assert!(!harness.pool_dir(&second).exists());
    assert!(ctx.rotation_state.get(&first.id).await.last_rotated.is_none());
    assert!(manager.list_pools().await.expect("list").is_empty());

    // Promoted artwork stays where the catalog expects it.
    assert!(harness.content_dir(&first).join("poster.png").exists());
}
