#[cfg(feature = "redis")]
mod tests {
    use std::time::Duration;

    use dotenvy::dotenv;
    use http::HeaderMap;
    use serial_test::serial;
    use stowage_core::{Expiry, Revalidator, Storer};
    use stowage_store::{RedisConfig, RedisStorer};

    fn wire_response(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    async fn connect() -> RedisStorer {
        dotenv().ok();
        let url = std::env::var("REDIS_URI").expect("Set REDIS_URI env variable");

        RedisStorer::connect(
            RedisConfig {
                url,
                ..RedisConfig::default()
            },
            Duration::from_secs(60),
        )
        .await
        .expect("Error while establishing redis connection")
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Redis, set REDIS_URI"]
    async fn test_set_get_delete() {
        let storer = connect().await;
        storer.reset().await.unwrap();

        assert!(storer.get("missing").await.is_none());

        storer.set("key", b"value", Expiry::Backend).await.unwrap();
        assert_eq!(storer.get("key").await.unwrap(), b"value");

        storer.delete("key").await;
        assert!(storer.get("key").await.is_none());
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Redis, set REDIS_URI"]
    async fn test_set_with_expiry() {
        let storer = connect().await;
        storer.reset().await.unwrap();

        storer
            .set("key", b"value", Expiry::After(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(storer.get("key").await.is_some());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(storer.get("key").await.is_none());
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Redis, set REDIS_URI"]
    async fn test_multi_level_round_trip() {
        let storer = connect().await;
        storer.reset().await.unwrap();

        storer
            .set_multi_level(
                "base",
                "base-variant",
                &wire_response("hello from redis"),
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

        assert_eq!(elected.fresh.unwrap().body(), b"hello from redis");
        assert_eq!(storer.list_keys().await, vec!["real-key"]);
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Redis, set REDIS_URI"]
    async fn test_map_keys_and_delete_many() {
        let storer = connect().await;
        storer.reset().await.unwrap();

        storer.set("P_a", b"1", Expiry::Backend).await.unwrap();
        storer.set("P_b", b"2", Expiry::Backend).await.unwrap();
        storer.set("Q_c", b"3", Expiry::Backend).await.unwrap();

        let keys = storer.map_keys("P_").await;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("a").unwrap(), "1");

        storer.delete_many("^P_.*").await;
        assert!(storer.map_keys("P_").await.is_empty());
        assert!(storer.get("Q_c").await.is_some());
    }
}
