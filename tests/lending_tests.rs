//! Rent/return state machine against a real database

mod common;

use library_lending::error::{AppError, Resource};
use sqlx::PgPool;

#[sqlx::test]
#[ignore]
async fn rent_then_return_keeps_state_consistent(pool: PgPool) {
    let state = common::state(pool.clone());
    let author = common::author(&state, "Octavia Butler").await;
    let book = common::book(&state, author.id, "Kindred").await;
    let first = common::user(&state, "First").await;
    let second = common::user(&state, "Second").await;
    let lending = &state.services.lending;

    let rental = lending.rent_book(book.id, first.id).await.unwrap();
    assert_eq!(rental.book_id, book.id);
    assert_eq!(rental.user_id, first.id);

    let rented = state.services.catalog.get_book(book.id).await.unwrap();
    assert!(!rented.available);
    let held = lending.current_rental(book.id).await.unwrap().unwrap();
    assert_eq!(held.user_id, first.id);
    assert_eq!(common::popularity(&state, author.id).await, 1);

    let err = lending.rent_book(book.id, second.id).await.unwrap_err();
    assert!(matches!(err, AppError::RentInvalid));

    let returned = lending.return_book(book.id, first.id).await.unwrap();
    assert!(returned.available);
    assert_eq!(common::rental_count(&pool, book.id).await, 0);
    assert!(lending.current_rental(book.id).await.unwrap().is_none());
    assert_eq!(common::popularity(&state, author.id).await, 1);

    assert!(lending.audit().await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore]
async fn concurrent_rents_have_exactly_one_winner(pool: PgPool) {
    let state = common::state(pool.clone());
    let author = common::author(&state, "Stanislaw Lem").await;
    let book = common::book(&state, author.id, "Solaris").await;

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(common::user(&state, &format!("Reader{i}")).await);
    }

    let mut handles = Vec::new();
    for user in &users {
        let lending = state.services.lending.clone();
        let (book_id, user_id) = (book.id, user.id);
        handles.push(tokio::spawn(async move { lending.rent_book(book_id, user_id).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AppError::RentInvalid) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(common::rental_count(&pool, book.id).await, 1);
    assert!(!state.services.catalog.get_book(book.id).await.unwrap().available);
    assert_eq!(common::popularity(&state, author.id).await, 1);
    assert!(state.services.lending.audit().await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore]
async fn rents_on_distinct_books_all_succeed(pool: PgPool) {
    let state = common::state(pool);
    let author = common::author(&state, "Italo Calvino").await;
    let reader = common::user(&state, "Reader").await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let book = common::book(&state, author.id, &format!("Invisible Cities {i}")).await;
        let lending = state.services.lending.clone();
        let user_id = reader.id;
        handles.push(tokio::spawn(async move { lending.rent_book(book.id, user_id).await }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(common::popularity(&state, author.id).await, 5);
    let held = state.services.lending.rented_books(reader.id).await.unwrap();
    assert_eq!(held.len(), 5);
    assert!(held.iter().all(|b| !b.available));
}

#[sqlx::test]
#[ignore]
async fn return_without_rental_is_not_found(pool: PgPool) {
    let state = common::state(pool.clone());
    let author = common::author(&state, "Ted Chiang").await;
    let book = common::book(&state, author.id, "Exhalation").await;
    let reader = common::user(&state, "Reader").await;

    let err = state.services.lending.return_book(book.id, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Resource::Book)));

    let unchanged = state.services.catalog.get_book(book.id).await.unwrap();
    assert!(unchanged.available);
    assert_eq!(common::rental_count(&pool, book.id).await, 0);
    assert_eq!(common::popularity(&state, author.id).await, 0);
}

#[sqlx::test]
#[ignore]
async fn return_by_another_user_leaves_rental_in_place(pool: PgPool) {
    let state = common::state(pool.clone());
    let author = common::author(&state, "N. K. Jemisin").await;
    let book = common::book(&state, author.id, "The Fifth Season").await;
    let holder = common::user(&state, "Holder").await;
    let other = common::user(&state, "Other").await;
    let lending = &state.services.lending;

    lending.rent_book(book.id, holder.id).await.unwrap();

    let err = lending.return_book(book.id, other.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Resource::Book)));
    assert_eq!(common::rental_count(&pool, book.id).await, 1);
    assert!(!state.services.catalog.get_book(book.id).await.unwrap().available);

    // a second return by the holder after a successful one also fails
    lending.return_book(book.id, holder.id).await.unwrap();
    let err = lending.return_book(book.id, holder.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Resource::Book)));
}

#[sqlx::test]
#[ignore]
async fn popularity_counts_every_successful_rent(pool: PgPool) {
    let state = common::state(pool);
    let author = common::author(&state, "Jorge Luis Borges").await;
    let book = common::book(&state, author.id, "Ficciones").await;
    let reader = common::user(&state, "Reader").await;
    let lending = &state.services.lending;

    for _ in 0..3 {
        lending.rent_book(book.id, reader.id).await.unwrap();
        lending.return_book(book.id, reader.id).await.unwrap();
    }
    assert_eq!(common::popularity(&state, author.id).await, 3);

    // failed rents do not count
    lending.rent_book(book.id, reader.id).await.unwrap();
    let _ = lending.rent_book(book.id, reader.id).await.unwrap_err();
    assert_eq!(common::popularity(&state, author.id).await, 4);
}

#[sqlx::test]
#[ignore]
async fn rent_rejects_unknown_book_and_user(pool: PgPool) {
    let state = common::state(pool);
    let author = common::author(&state, "Le Guin").await;
    let book = common::book(&state, author.id, "The Dispossessed").await;
    let reader = common::user(&state, "Reader").await;
    let lending = &state.services.lending;

    let err = lending.rent_book(book.id + 1000, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::RentInvalid));

    let err = lending.rent_book(book.id, reader.id + 1000).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Resource::User)));

    state.services.users.delete_user(reader.id).await.unwrap();
    let err = lending.rent_book(book.id, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Resource::User)));

    assert!(state.services.catalog.get_book(book.id).await.unwrap().available);
    assert_eq!(common::popularity(&state, author.id).await, 0);
}

#[sqlx::test]
#[ignore]
async fn audit_reports_flag_drift(pool: PgPool) {
    let state = common::state(pool.clone());
    let author = common::author(&state, "Mervyn Peake").await;
    let book = common::book(&state, author.id, "Titus Groan").await;

    sqlx::query("UPDATE books SET available = false WHERE id = $1")
        .bind(book.id)
        .execute(&pool)
        .await
        .unwrap();

    let found = state.services.lending.audit().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].book_id, book.id);
    assert!(!found[0].available);
    assert_eq!(found[0].rented_by, None);
}

#[sqlx::test]
#[ignore]
async fn blocked_rent_times_out_without_partial_writes(pool: PgPool) {
    let state = common::state(pool.clone());
    let author = common::author(&state, "Gene Wolfe").await;
    let book = common::book(&state, author.id, "The Book of the New Sun").await;
    let reader = common::user(&state, "Reader").await;

    // Another session holds the book row until the rent gives up
    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
        .bind(book.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = state.services.lending.rent_book(book.id, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::Timeout), "unexpected error: {err:?}");
    assert!(err.is_retryable());

    holder.rollback().await.unwrap();

    assert_eq!(common::rental_count(&pool, book.id).await, 0);
    assert_eq!(common::popularity(&state, author.id).await, 0);
    assert!(state.services.catalog.get_book(book.id).await.unwrap().available);
}
