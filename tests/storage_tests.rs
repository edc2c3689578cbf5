use marketplace_portal::storage::{
    BACKGROUND_CHECK_PREFIX, MockStorageService, S3StorageClient, StorageService, document_key,
    sanitize_key,
};
use uuid::Uuid;

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_sanitize_key_strips_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_key("a//b/./c/"), "a/b/c");
        assert_eq!(sanitize_key("background-checks/p/doc.pdf"), "background-checks/p/doc.pdf");
    }

    #[test]
    fn test_document_key_is_scoped_to_provider() {
        let provider_id = Uuid::new_v4();
        let key = document_key(provider_id, "Passport Scan.PDF");

        let expected_prefix = format!("{}/{}/", BACKGROUND_CHECK_PREFIX, provider_id);
        assert!(key.starts_with(&expected_prefix), "unexpected key {key}");
        assert!(key.ends_with(".pdf"));
        // The original filename never leaks into the key.
        assert!(!key.contains("Passport"));
    }

    #[test]
    fn test_document_key_falls_back_to_bin() {
        let provider_id = Uuid::new_v4();
        assert!(document_key(provider_id, "no-extension").ends_with(".bin"));
        assert!(document_key(provider_id, "weird.p/df").ends_with(".bin"));
    }

    #[test]
    fn test_document_keys_are_unique() {
        let provider_id = Uuid::new_v4();
        assert_ne!(
            document_key(provider_id, "id.jpg"),
            document_key(provider_id, "id.jpg")
        );
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "background-checks/provider/doc.pdf";
        let url = mock
            .get_presigned_upload_url(key, "application/pdf")
            .await
            .unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.get_presigned_upload_url("doc.pdf", "application/pdf").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .get_presigned_upload_url("../../etc/passwd", "text/plain")
            .await
            .unwrap();

        assert!(!url.contains(".."));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await;

        let key = document_key(Uuid::new_v4(), "licence.pdf");
        // Presigning is local: no request reaches the endpoint.
        let url = client
            .get_presigned_upload_url(&key, "application/pdf")
            .await
            .unwrap();

        assert!(url.contains("localhost:9000"));
        assert!(url.contains("testbucket"));
        assert!(url.contains(&key));
    }
}
