#[cfg(feature = "fjall")]
mod tests {
    use std::time::Duration;

    use http::HeaderMap;
    use stowage_core::{Expiry, Revalidator, Storer};
    use stowage_store::FjallStorer;
    use tempfile::TempDir;

    fn wire_response(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    fn open(dir: &TempDir) -> FjallStorer {
        FjallStorer::open(dir.path(), Duration::from_secs(60))
            .expect("Failed to open the fjall keyspace")
    }

    #[tokio::test]
    async fn test_get_never_written_key_is_empty() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        assert!(storer.get("never-written").await.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        storer.set("key", b"value", Expiry::Backend).await.unwrap();
        assert_eq!(storer.get("key").await.unwrap(), b"value");
    }

    #[tokio::test]
    async fn test_values_survive_a_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let storer = open(&dir);
            storer
                .set("key", b"durable", Expiry::Never)
                .await
                .unwrap();
        }

        let storer = open(&dir);
        assert_eq!(storer.get("key").await.unwrap(), b"durable");
    }

    #[tokio::test]
    async fn test_expired_value_is_reclaimed_on_read() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        storer
            .set("key", b"value", Expiry::After(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(storer.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_map_keys_strips_the_prefix() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        storer.set("P_a", b"1", Expiry::Backend).await.unwrap();
        storer.set("P_b", b"2", Expiry::Backend).await.unwrap();
        storer.set("Q_c", b"3", Expiry::Backend).await.unwrap();

        let keys = storer.map_keys("P_").await;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("a").unwrap(), "1");
        assert_eq!(keys.get("b").unwrap(), "2");
    }

    #[tokio::test]
    async fn test_multi_level_round_trip_is_fresh() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        storer
            .set_multi_level(
                "base",
                "base-variant",
                &wire_response("hello from disk"),
                &HeaderMap::new(),
                "",
                Duration::from_secs(60),
                "real-key",
            )
            .await
            .unwrap();

        let mut validator = Revalidator::default();
        let elected = storer
            .get_multi_level("base", &HeaderMap::new(), &mut validator)
            .await;

        assert_eq!(elected.fresh.unwrap().body(), b"hello from disk");
        assert_eq!(storer.list_keys().await, vec!["real-key"]);
    }

    #[tokio::test]
    async fn test_delete_many_then_list_keys_is_empty() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        storer
            .set_multi_level(
                "base",
                "base-variant",
                &wire_response("body"),
                &HeaderMap::new(),
                "",
                Duration::from_secs(60),
                "real-key",
            )
            .await
            .unwrap();

        storer.delete_many(".*").await;
        assert!(storer.list_keys().await.is_empty());
        assert!(storer.get("base-variant").await.is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        storer.set("key", b"value", Expiry::Backend).await.unwrap();
        storer.reset().await.unwrap();

        assert!(storer.get("key").await.is_none());
        assert!(storer.map_keys("").await.is_empty());
    }

    #[tokio::test]
    async fn test_uuid_embeds_path_and_staleness() {
        let dir = TempDir::new().unwrap();
        let storer = open(&dir);

        let uuid = storer.uuid();
        assert!(uuid.contains(dir.path().to_str().unwrap()));
        assert!(uuid.ends_with("-60"));
    }
}
