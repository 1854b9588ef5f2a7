//! Catalog listings and inserts against a real database

mod common;

use library_lending::{
    error::{AppError, Resource},
    models::{book::CreateBook, ListParams},
};
use sqlx::PgPool;

#[sqlx::test]
#[ignore]
async fn create_book_for_unknown_author_is_not_found(pool: PgPool) {
    let state = common::state(pool);

    let err = state
        .services
        .catalog
        .create_book(CreateBook {
            title: "Orphan".to_string(),
            year: 2001,
            author_id: 999,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(Resource::Author)));
}

#[sqlx::test]
#[ignore]
async fn created_book_carries_author_name(pool: PgPool) {
    let state = common::state(pool);
    let author = common::author(&state, "Gene Wolfe").await;
    assert!(author.books.is_empty());
    assert_eq!(author.popularity, 0);

    let book = common::book(&state, author.id, "The Shadow of the Torturer").await;
    assert!(book.available);
    assert_eq!(book.author.name, "Gene Wolfe");

    let reloaded = state.services.catalog.get_author(author.id).await.unwrap();
    assert_eq!(reloaded.books.len(), 1);
    assert_eq!(reloaded.books[0].id, book.id);
}

#[sqlx::test]
#[ignore]
async fn empty_listing_has_zero_last_page(pool: PgPool) {
    let state = common::state(pool);

    let page = state.services.catalog.list_books(&ListParams::default()).await.unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.metadata.last_page, 0);
    assert_eq!(page.metadata.total_records, 0);
}

#[sqlx::test]
#[ignore]
async fn books_paginate_in_twenties(pool: PgPool) {
    let state = common::state(pool);
    let author = common::author(&state, "Terry Pratchett").await;
    for i in 0..45 {
        common::book(&state, author.id, &format!("Discworld {i:02}")).await;
    }

    let catalog = &state.services.catalog;
    let first = catalog.list_books(&ListParams::new(1, 20, "id")).await.unwrap();
    assert_eq!(first.data.len(), 20);
    assert_eq!(first.metadata.last_page, 3);
    assert_eq!(first.metadata.total_records, 45);

    let last = catalog.list_books(&ListParams::new(3, 20, "id")).await.unwrap();
    assert_eq!(last.data.len(), 5);
    assert_eq!(last.metadata.current_page, 3);

    let beyond = catalog.list_books(&ListParams::new(4, 20, "id")).await.unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.metadata.total_records, 45);

    let by_title_desc = catalog.list_books(&ListParams::new(1, 5, "-title")).await.unwrap();
    assert_eq!(by_title_desc.data[0].title, "Discworld 44");
}

#[sqlx::test]
#[ignore]
async fn authors_sort_descending_by_name(pool: PgPool) {
    let state = common::state(pool);
    for name in ["Cixin", "Asimov", "Ekwensi", "Banks", "Delany"] {
        let author = common::author(&state, name).await;
        common::book(&state, author.id, &format!("{name} collected")).await;
    }

    let page = state
        .services
        .catalog
        .list_authors(&ListParams::new(1, 20, "-name"))
        .await
        .unwrap();

    let names: Vec<&str> = page.data.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Ekwensi", "Delany", "Cixin", "Banks", "Asimov"]);
    assert_eq!(page.metadata.last_page, 1);
    assert!(page.data.iter().all(|a| a.books.len() == 1));
}

#[sqlx::test]
#[ignore]
async fn unsafe_sort_key_is_rejected(pool: PgPool) {
    let state = common::state(pool);

    let err = state
        .services
        .catalog
        .list_books(&ListParams::new(1, 20, "title; DROP TABLE books"))
        .await
        .unwrap_err();

    match err {
        AppError::Validation(fields) => assert!(fields.get("sort").is_some()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[sqlx::test]
#[ignore]
async fn top_rated_orders_page_by_popularity(pool: PgPool) {
    let state = common::state(pool);
    let reader = common::user(&state, "Reader").await;

    for (name, rents) in [("Quiet", 0), ("Popular", 2), ("Steady", 1), ("AlsoPopular", 2)] {
        let author = common::author(&state, name).await;
        for i in 0..rents {
            let book = common::book(&state, author.id, &format!("{name} {i}")).await;
            state.services.lending.rent_book(book.id, reader.id).await.unwrap();
        }
    }

    let page = state
        .services
        .catalog
        .list_top_rated_authors(&ListParams::new(1, 20, "id"))
        .await
        .unwrap();

    let names: Vec<&str> = page.data.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Popular", "AlsoPopular", "Steady", "Quiet"]);
}

#[sqlx::test]
#[ignore]
async fn reset_popularity_zeroes_counter(pool: PgPool) {
    let state = common::state(pool);
    let author = common::author(&state, "Mieville").await;
    let book = common::book(&state, author.id, "Perdido Street Station").await;
    let reader = common::user(&state, "Reader").await;
    state.services.lending.rent_book(book.id, reader.id).await.unwrap();

    let reset = state.services.catalog.reset_popularity(author.id).await.unwrap();
    assert_eq!(reset.popularity, 0);

    let err = state.services.catalog.reset_popularity(author.id + 1000).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Resource::Author)));
}
