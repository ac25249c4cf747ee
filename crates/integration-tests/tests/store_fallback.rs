//! Dual-store degradation: the engine must keep working when the remote
//! store goes away, and come back remote-first only after an explicit
//! resync.

use daily_dish_core::DishId;
use daily_dish_engine::models::{ChallengePurpose, Dish, NewShoppingItem};

use daily_dish_integration_tests::TestEngine;

fn dish(id: i64, name: &str) -> Dish {
    Dish {
        id: DishId::new(id),
        name: name.to_string(),
        ingredients: vec!["eggs".to_string()],
        category: "breakfast".to_string(),
        kind: "veg".to_string(),
    }
}

async fn register_and_login(tx: &TestEngine, email: &str) {
    tx.engine
        .identity
        .request_registration_code(email)
        .await
        .unwrap();
    let code = tx.delivered_code(email);
    tx.engine
        .identity
        .verify_code(email, ChallengePurpose::Registration, &code)
        .unwrap();
    tx.engine.identity.register(email, "Ana", "secret1").await.unwrap();
    tx.engine.identity.login(email, "secret1").await.unwrap();
}

#[tokio::test]
async fn test_writes_succeed_while_remote_down() {
    let tx = TestEngine::new();
    register_and_login(&tx, "a@b.com").await;

    tx.remote.set_failing(true);

    // Writes land locally; subsequent reads reflect them.
    tx.engine
        .personalization
        .add_to_shopping_list(NewShoppingItem::ingredient("eggs"))
        .await
        .unwrap();
    let list = tx.engine.personalization.get_shopping_list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert!(tx.engine.store.is_degraded());
}

#[tokio::test]
async fn test_degraded_session_stays_local_until_resync() {
    let tx = TestEngine::new();
    register_and_login(&tx, "a@b.com").await;

    tx.remote.set_failing(true);
    let dish7 = dish(7, "Shakshuka");
    tx.engine.personalization.toggle_favorite(&dish7).await.unwrap();
    assert!(tx.engine.store.is_degraded());

    // Remote recovers, but the session keeps preferring local until a
    // manual resync.
    tx.remote.set_failing(false);
    assert!(tx.engine.store.is_degraded());
    assert!(tx.engine.personalization.is_favorite(dish7.id).await.unwrap());

    assert!(tx.engine.store.resync().await);
    assert!(!tx.engine.store.is_degraded());
}

#[tokio::test]
async fn test_login_works_from_local_store_while_degraded() {
    let tx = TestEngine::new();
    register_and_login(&tx, "a@b.com").await;
    tx.engine.identity.logout();

    // Account documents were mirrored locally during registration, so
    // login still works with the remote gone.
    tx.remote.set_failing(true);
    let session = tx.engine.identity.login("a@b.com", "secret1").await.unwrap();
    assert_eq!(session.email.as_str(), "a@b.com");
}

#[tokio::test]
async fn test_challenges_never_touch_the_remote_store() {
    let tx = TestEngine::new();

    // The whole passcode flow works with the remote down from the start.
    tx.remote.set_failing(true);
    tx.engine
        .identity
        .request_registration_code("a@b.com")
        .await
        .unwrap();
    let code = tx.delivered_code("a@b.com");
    tx.engine
        .identity
        .verify_code("a@b.com", ChallengePurpose::Registration, &code)
        .unwrap();
    tx.engine
        .identity
        .register("a@b.com", "Ana", "secret1")
        .await
        .unwrap();

    // And nothing challenge-shaped ever reached the remote double.
    assert!(tx.remote.document("challenges/registration/a@b.com").is_none());
}

#[tokio::test]
async fn test_password_reset_existence_check_survives_degradation() {
    let tx = TestEngine::new();
    register_and_login(&tx, "a@b.com").await;

    tx.remote.set_failing(true);
    // The account index is mirrored locally, so the reset flow finds the
    // email instead of reporting a false "not registered".
    tx.engine
        .identity
        .request_password_reset("a@b.com")
        .await
        .unwrap();
    let code = tx.delivered_code("a@b.com");
    tx.engine
        .identity
        .reset_password("a@b.com", &code, "newsecret")
        .await
        .unwrap();
    tx.engine.identity.logout();
    tx.engine.identity.login("a@b.com", "newsecret").await.unwrap();
}
