mod helpers;

use memorylink::error::ErrorKind;
use memorylink::memory::validate::MAX_CONTENT_CHARS;
use memorylink::memory::{Metadata, MetadataValue, SearchRequest, WriteRequest};

#[tokio::test]
async fn stored_memory_is_found_by_meaning() {
    let p = helpers::pipeline();
    let metadata = Metadata::new().with("tag", MetadataValue::String("devops".into()));
    let receipt = p
        .orchestrator
        .write(WriteRequest::new("Docker containers isolate dependencies").with_metadata(metadata))
        .await
        .unwrap();

    let response = p
        .orchestrator
        .search(SearchRequest::new("container isolation", 5, 0.2))
        .await
        .unwrap();

    assert_eq!(response.query, "container isolation");
    assert_eq!(response.total_found, response.results.len());
    let hit = &response.results[0];
    assert_eq!(hit.memory_id, receipt.id);
    assert_eq!(hit.content, "Docker containers isolate dependencies");
    assert!(hit.similarity >= 0.2 && hit.similarity <= 1.0);
    assert_eq!(
        hit.metadata.get("tag"),
        Some(&MetadataValue::String("devops".into()))
    );
    assert_eq!(hit.created_at, receipt.created_at);
}

#[tokio::test]
async fn strict_threshold_on_empty_store_is_empty_not_error() {
    let p = helpers::pipeline();
    let response = p
        .orchestrator
        .search(SearchRequest::new("anything at all", 10, 0.99))
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.total_found, 0);
}

#[tokio::test]
async fn content_length_boundary() {
    let p = helpers::pipeline();

    let at_limit = "a".repeat(MAX_CONTENT_CHARS);
    p.orchestrator.write(WriteRequest::new(at_limit)).await.unwrap();

    let over_limit = "a".repeat(MAX_CONTENT_CHARS + 1);
    let err = p
        .orchestrator
        .write(WriteRequest::new(over_limit))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(p.orchestrator.stats().await.unwrap().total_memories, 1);
}

#[tokio::test]
async fn results_are_ordered_bounded_and_above_threshold() {
    let p = helpers::pipeline();
    for text in [
        "sourdough bread needs a long cold proof",
        "bread flour has more protein than cake flour",
        "the bus to the airport leaves every twenty minutes",
        "baking bread at home on weekends",
        "quarterly tax filing is due in april",
        "rye bread is dense and sour",
    ] {
        p.orchestrator.write(WriteRequest::new(text)).await.unwrap();
    }

    let threshold = 0.1;
    let response = p
        .orchestrator
        .search(SearchRequest::new("homemade bread", 3, threshold))
        .await
        .unwrap();

    assert!(!response.results.is_empty());
    assert!(response.results.len() <= 3);
    for pair in response.results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    assert!(response.results.iter().all(|r| r.similarity >= threshold));
}

#[tokio::test]
async fn corrupted_record_is_isolated() {
    let p = helpers::pipeline();
    let good = p
        .orchestrator
        .write(WriteRequest::new("rust ownership and borrowing"))
        .await
        .unwrap();
    let bad = p
        .orchestrator
        .write(WriteRequest::new("rust ownership rules explained"))
        .await
        .unwrap();

    let conn = helpers::raw_connection(&p.db_path);
    helpers::corrupt_ciphertext(&conn, &bad.id);

    let response = p
        .orchestrator
        .search(SearchRequest::new("rust ownership and borrowing", 10, 0.0))
        .await
        .unwrap();
    let ids: Vec<&str> = response.results.iter().map(|r| r.memory_id.as_str()).collect();
    assert!(ids.contains(&good.id.as_str()));
    assert!(!ids.contains(&bad.id.as_str()));

    let err = p.orchestrator.get(&bad.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn memories_survive_reopen() {
    let p = helpers::pipeline();
    let receipt = p
        .orchestrator
        .write(WriteRequest::new("the spare key is under the blue flowerpot"))
        .await
        .unwrap();
    drop(p.orchestrator);

    let reopened = helpers::orchestrator_at(&p.db_path, [7u8; 32]);
    let record = reopened.get(&receipt.id).await.unwrap().unwrap();
    assert_eq!(record.content, "the spare key is under the blue flowerpot");
}

#[tokio::test]
async fn wrong_key_cannot_read_existing_memories() {
    let p = helpers::pipeline();
    let receipt = p
        .orchestrator
        .write(WriteRequest::new("bank pin hint: birthday of the cat"))
        .await
        .unwrap();

    let other_key = helpers::orchestrator_at(&p.db_path, [8u8; 32]);
    let err = other_key.get(&receipt.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    let response = other_key
        .search(SearchRequest::new("bank pin hint", 5, 0.0))
        .await
        .unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn plaintext_never_reaches_disk() {
    let p = helpers::pipeline();
    let secret = "my locker combination is 31-7-22";
    p.orchestrator.write(WriteRequest::new(secret)).await.unwrap();
    drop(p.orchestrator);

    let conn = helpers::raw_connection(&p.db_path);
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);").unwrap();
    drop(conn);

    let bytes = std::fs::read(&p.db_path).unwrap();
    let needle = secret.as_bytes();
    assert!(!bytes.windows(needle.len()).any(|w| w == needle));
}
