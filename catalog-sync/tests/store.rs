use catalog_sync::error::CatalogError;
use catalog_sync::store::{CountScope, ProductStore};
use catalog_sync::types::{DateRange, ProductFilters, ProductUpsert};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_product(
    db: &PgPool,
    external_id: &str,
    name: &str,
    category: Option<&str>,
    price: Option<Decimal>,
    content_created_at: Option<DateTime<Utc>>,
    deleted: bool,
) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query(
        r#"
        INSERT INTO products (id, external_id, name, category, price, content_created_at, deleted, deleted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 THEN now() ELSE NULL END)"#,
    )
    .bind(id)
    .bind(external_id)
    .bind(name)
    .bind(category)
    .bind(price)
    .bind(content_created_at)
    .bind(deleted)
    .execute(db)
    .await
    .unwrap();
    id
}

fn record(external_id: &str, name: &str) -> ProductUpsert {
    ProductUpsert {
        external_id: external_id.to_string(),
        sku: None,
        name: name.to_string(),
        brand: None,
        model: None,
        category: None,
        color: None,
        price: None,
        currency: None,
        stock: None,
        content_created_at: None,
        content_updated_at: None,
    }
}

fn filters(name: Option<&str>, category: Option<&str>, page: u32, limit: u32) -> ProductFilters {
    ProductFilters {
        name: name.map(str::to_string),
        category: category.map(str::to_string),
        page: Some(page),
        limit: Some(limit),
    }
}

async fn total_rows(db: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM products")
        .fetch_one(db)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn page_and_limit_bounds_are_rejected(db: PgPool) {
    let store = ProductStore::new(db);

    for bad in [
        filters(None, None, 0, 5),
        filters(None, None, 1, 0),
        filters(None, None, 1, 6),
    ] {
        let err = store.find_page(&bad).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)), "{bad:?}");
    }
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn find_page_filters_skips_and_excludes_tombstones(db: PgPool) {
    for i in 1..=7 {
        seed_product(
            &db,
            &format!("ext-w{i}"),
            &format!("Widget {i}"),
            Some("Tools"),
            None,
            None,
            false,
        )
        .await;
    }
    seed_product(&db, "ext-del", "Widget deleted", Some("Tools"), None, None, true).await;
    seed_product(&db, "ext-g", "Gadget", Some("Toys"), None, None, false).await;

    let store = ProductStore::new(db);

    // case-insensitive substring match, tombstone excluded from both page and total
    let (page_one, total) = store
        .find_page(&filters(Some("wIdGeT"), None, 1, 5))
        .await
        .unwrap();
    assert_eq!(total, 7);
    assert_eq!(page_one.len(), 5);

    let (page_two, total) = store
        .find_page(&filters(Some("wIdGeT"), None, 2, 5))
        .await
        .unwrap();
    assert_eq!(total, 7);
    assert_eq!(page_two.len(), 2);

    // ordering is by id, so the two pages partition the result set
    let mut seen: Vec<Uuid> = page_one.iter().chain(page_two.iter()).map(|p| p.id).collect();
    let unsorted = seen.clone();
    seen.sort();
    assert_eq!(seen, unsorted);
    assert_eq!(seen.len(), 7);

    let (by_category, total) = store
        .find_page(&filters(None, Some("tool"), 1, 5))
        .await
        .unwrap();
    assert_eq!(total, 7);
    assert!(by_category.iter().all(|p| p.category.as_deref() == Some("Tools")));

    let (none, total) = store
        .find_page(&filters(Some("widget"), Some("Toys"), 1, 5))
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(none.is_empty());
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn huge_page_numbers_do_not_overflow_the_offset(db: PgPool) {
    seed_product(&db, "ext-1", "Lonely", None, None, None, false).await;

    let store = ProductStore::new(db);

    // (page-1)*limit exceeds u32 here; the skip must widen, not wrap
    let (items, total) = store
        .find_page(&filters(None, None, 4_000_000_000, 5))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert!(items.is_empty());
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn find_by_external_ids_sees_tombstones(db: PgPool) {
    seed_product(&db, "ext-1", "Active", None, None, None, false).await;
    seed_product(&db, "ext-2", "Gone", None, None, None, true).await;

    let store = ProductStore::new(db);

    let rows = store
        .find_by_external_ids(&["ext-1".to_string(), "ext-2".to_string(), "ext-3".to_string()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|p| p.external_id == "ext-2" && p.deleted));

    // empty input short-circuits instead of matching everything
    let rows = store.find_by_external_ids(&[]).await.unwrap();
    assert!(rows.is_empty());
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn soft_delete_is_idempotent_and_404s_on_missing_rows(db: PgPool) {
    let id = seed_product(&db, "ext-1", "Short lived", None, None, None, false).await;

    let store = ProductStore::new(db.clone());

    let err = store.soft_delete(Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    assert_eq!(store.soft_delete(id).await.unwrap(), 1);
    let (deleted, first_deleted_at): (bool, Option<DateTime<Utc>>) =
        sqlx::query_as("SELECT deleted, deleted_at FROM products WHERE id = $1")
            .bind(id)
            .fetch_one(&db)
            .await
            .unwrap();
    assert!(deleted);
    let first_deleted_at = first_deleted_at.unwrap();

    // re-deleting succeeds and refreshes the tombstone timestamp
    assert_eq!(store.soft_delete(id).await.unwrap(), 1);
    let (deleted, second_deleted_at): (bool, Option<DateTime<Utc>>) =
        sqlx::query_as("SELECT deleted, deleted_at FROM products WHERE id = $1")
            .bind(id)
            .fetch_one(&db)
            .await
            .unwrap();
    assert!(deleted);
    assert!(second_deleted_at.unwrap() >= first_deleted_at);
    assert_eq!(total_rows(&db).await, 1);
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn bulk_upsert_creates_updates_and_never_touches_tombstones(db: PgPool) {
    let tombstone_id = seed_product(&db, "ext-dead", "Frozen", None, None, None, true).await;
    seed_product(&db, "ext-old", "Old name", None, None, None, false).await;

    let store = ProductStore::new(db.clone());

    let mut refreshed = record("ext-old", "New name");
    refreshed.price = Some(Decimal::new(1999, 2));
    let affected = store
        .bulk_upsert(&[
            record("ext-new", "Brand new"),
            refreshed,
            record("ext-dead", "Revived?"),
        ])
        .await
        .unwrap();
    // tombstone excluded by the conflict guard
    assert_eq!(affected, 2);
    assert_eq!(total_rows(&db).await, 3);

    let rows = store
        .find_by_external_ids(&[
            "ext-dead".to_string(),
            "ext-old".to_string(),
            "ext-new".to_string(),
        ])
        .await
        .unwrap();

    let dead = rows.iter().find(|p| p.external_id == "ext-dead").unwrap();
    assert!(dead.deleted);
    assert_eq!(dead.name, "Frozen");
    assert_eq!(dead.id, tombstone_id);

    let old = rows.iter().find(|p| p.external_id == "ext-old").unwrap();
    assert_eq!(old.name, "New name");
    assert_eq!(old.price, Some(Decimal::new(1999, 2)));
    assert!(!old.deleted);

    assert!(rows.iter().any(|p| p.external_id == "ext-new"));
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn bulk_upsert_spans_multiple_chunks(db: PgPool) {
    let store = ProductStore::new(db.clone());

    let records: Vec<ProductUpsert> = (0..250)
        .map(|i| record(&format!("ext-{i}"), &format!("Product {i}")))
        .collect();
    assert_eq!(store.bulk_upsert(&records).await.unwrap(), 250);
    assert_eq!(total_rows(&db).await, 250);

    // identical re-run converges to the same state, no duplicates
    assert_eq!(store.bulk_upsert(&records).await.unwrap(), 250);
    assert_eq!(total_rows(&db).await, 250);

    let renamed: Vec<ProductUpsert> = (0..250)
        .map(|i| record(&format!("ext-{i}"), &format!("Renamed {i}")))
        .collect();
    store.bulk_upsert(&renamed).await.unwrap();
    let rows = store
        .find_by_external_ids(&["ext-137".to_string()])
        .await
        .unwrap();
    assert_eq!(rows[0].name, "Renamed 137");
}

#[sqlx::test(migrations = "./tests/test_migrations")]
async fn counts_and_averages_respect_scope_and_range(db: PgPool) {
    let in_range = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let out_of_range = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let range = DateRange {
        start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap(),
    };

    seed_product(
        &db,
        "ext-1",
        "Watch",
        Some("Smartwatch"),
        Some(Decimal::new(10000, 2)),
        Some(in_range),
        false,
    )
    .await;
    seed_product(
        &db,
        "ext-2",
        "Watch Pro",
        Some("Smartwatch"),
        Some(Decimal::new(30000, 2)),
        Some(in_range),
        false,
    )
    .await;
    seed_product(&db, "ext-3", "Phone", Some("Phone"), None, Some(in_range), false).await;
    seed_product(
        &db,
        "ext-4",
        "Old phone",
        Some("Phone"),
        Some(Decimal::new(5000, 2)),
        Some(out_of_range),
        false,
    )
    .await;
    seed_product(
        &db,
        "ext-5",
        "Dead watch",
        Some("Smartwatch"),
        Some(Decimal::new(99900, 2)),
        Some(in_range),
        true,
    )
    .await;
    seed_product(&db, "ext-6", "Uncategorized", None, Some(Decimal::new(100, 2)), None, false).await;

    let store = ProductStore::new(db);

    assert_eq!(store.count_products(CountScope::All, None).await.unwrap(), 6);
    assert_eq!(
        store
            .count_products(CountScope::ActiveOnly, None)
            .await
            .unwrap(),
        5
    );
    assert_eq!(
        store
            .count_products(CountScope::DeletedOnly, None)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .count_products(CountScope::All, Some(&range))
            .await
            .unwrap(),
        4
    );
    assert_eq!(
        store
            .count_products(CountScope::ActiveOnly, Some(&range))
            .await
            .unwrap(),
        3
    );

    // tombstone price excluded, NULL prices ignored by AVG
    let avg = store.average_price(Some(&range)).await.unwrap().unwrap();
    assert_eq!(avg, Decimal::new(20000, 2));

    let empty_range = DateRange {
        start: Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(1999, 12, 31, 0, 0, 0).unwrap(),
    };
    assert_eq!(store.average_price(Some(&empty_range)).await.unwrap(), None);

    let by_category = store.average_price_by_category().await.unwrap();
    let categories: Vec<&str> = by_category.iter().map(|r| r.category.as_str()).collect();
    // NULL category is not a category; tombstones do not contribute
    assert_eq!(categories, vec!["Phone", "Smartwatch"]);
    let smartwatch = by_category
        .iter()
        .find(|r| r.category == "Smartwatch")
        .unwrap();
    assert_eq!(smartwatch.avg_price, Some(Decimal::new(20000, 2)));
}
