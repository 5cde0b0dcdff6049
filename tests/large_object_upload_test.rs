//! Large Object Upload Integration Tests
//!
//! Drives `ObjectUploader` end to end against a mock OBS endpoint:
//! single-PUT boundary, multipart with a segment failing once (server or
//! client error), segments failing twice (abort), abort failures and
//! completion retries.

#[cfg(test)]
mod tests {
    use obs_uploadr::auth::payload::EMPTY_PAYLOAD_SHA256;
    use obs_uploadr::config::{AddressingStyle, UploadConfig};
    use obs_uploadr::obs::{ObsClient, ObsClientConfig};
    use obs_uploadr::upload::{ObjectUploader, UploadError, UploadMethod, UploadOptions};
    use std::io::Write;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY_PATH: &str = "/test-bucket/big.bin";
    const UPLOAD_ID: &str = "upload-abc";

    fn create_uploader(mock_server: &MockServer, segment_size: u64) -> ObjectUploader {
        let client = ObsClient::new(ObsClientConfig {
            bucket: "test-bucket".to_string(),
            region: "eu-de".to_string(),
            endpoint: Some(mock_server.uri()),
            addressing_style: AddressingStyle::Path,
            access_key: Some("test-access".to_string()),
            secret_key: Some("test-secret".to_string()),
            security_token: None,
            timeout: None,
            unsigned_payload: false,
        })
        .unwrap();

        ObjectUploader::new(
            Arc::new(client),
            UploadConfig {
                segment_size,
                concurrent_segments: 3,
                checksum_metadata: false,
                ..UploadConfig::default()
            },
        )
    }

    fn source_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&content).unwrap();
        file
    }

    fn list_parts_xml(parts: u32) -> String {
        let mut xml = String::from("<ListPartsResult><IsTruncated>false</IsTruncated>");
        for part in 1..=parts {
            xml.push_str(&format!(
                "<Part><PartNumber>{}</PartNumber><ETag>\"etag-{}\"</ETag><Size>10</Size></Part>",
                part, part
            ));
        }
        xml.push_str("</ListPartsResult>");
        xml
    }

    async fn mount_initiate(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<InitiateMultipartUploadResult><UploadId>{}</UploadId></InitiateMultipartUploadResult>",
                UPLOAD_ID
            )))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_parts_ok(mock_server: &MockServer) {
        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
            .mount(mock_server)
            .await;
    }

    async fn mount_list_parts(mock_server: &MockServer, parts: u32) {
        Mock::given(method("GET"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_parts_xml(parts)))
            .mount(mock_server)
            .await;
    }

    async fn mount_abort(mock_server: &MockServer, status: u16, times: u64) {
        Mock::given(method("DELETE"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(status))
            .expect(times)
            .mount(mock_server)
            .await;
    }

    async fn complete_bodies(mock_server: &MockServer) -> Vec<String> {
        mock_server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|request| request.method.as_str() == "POST" && request.url.query() != Some("uploads"))
            .map(|request| String::from_utf8(request.body).unwrap())
            .collect()
    }

    // ========================================================================
    // TEST: Segment boundary
    // ========================================================================

    #[tokio::test]
    async fn test_file_at_segment_size_uses_single_put() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"single\""))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let file = source_file(10);
        let result = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(result.method, UploadMethod::Single);
        assert_eq!(result.etag, "\"single\"");
        assert_eq!(result.bytes_written, 10);
    }

    #[tokio::test]
    async fn test_zero_length_file_uses_empty_payload_hash() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .and(header("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"empty\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        let file = source_file(0);
        let result = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(result.method, UploadMethod::Single);
        assert_eq!(result.bytes_written, 0);
    }

    // ========================================================================
    // TEST: Multipart retry and abort
    // ========================================================================

    #[tokio::test]
    async fn test_segment_failing_once_completes_with_all_parts() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;

        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .and(query_param("partNumber", "3"))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_parts_ok(&mock_server).await;
        mount_list_parts(&mock_server, 5).await;

        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<CompleteMultipartUploadResult><ETag>\"final-5\"</ETag></CompleteMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_abort(&mock_server, 204, 0).await;

        let file = source_file(50);
        let result = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(result.method, UploadMethod::Multipart);
        assert_eq!(result.parts, 5);
        assert_eq!(result.etag, "\"final-5\"");

        let bodies = complete_bodies(&mock_server).await;
        assert_eq!(bodies.len(), 1);
        for part in 1..=5 {
            let tag = format!("<PartNumber>{}</PartNumber>", part);
            assert_eq!(bodies[0].matches(&tag).count(), 1, "part {} once", part);
        }
    }

    #[tokio::test]
    async fn test_segment_client_error_once_is_retried() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;

        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .and(query_param("partNumber", "2"))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<Error><Code>BadDigest</Code><Message>digest mismatch</Message></Error>",
            ))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_parts_ok(&mock_server).await;
        mount_list_parts(&mock_server, 3).await;

        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<CompleteMultipartUploadResult><ETag>\"final-3\"</ETag></CompleteMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_abort(&mock_server, 204, 0).await;

        let file = source_file(30);
        let result = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(result.parts, 3);
        assert_eq!(result.etag, "\"final-3\"");

        let part_two_puts = mock_server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|request| {
                request.method.as_str() == "PUT"
                    && request.url.query_pairs().any(|(k, v)| k == "partNumber" && v == "2")
            })
            .count();
        assert_eq!(part_two_puts, 2);
    }

    #[tokio::test]
    async fn test_completion_client_error_once_is_retried() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;
        mount_parts_ok(&mock_server).await;
        mount_list_parts(&mock_server, 2).await;

        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<Error><Code>InvalidPart</Code><Message>part not ready</Message></Error>",
            ))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<CompleteMultipartUploadResult><ETag>\"final-2\"</ETag></CompleteMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_abort(&mock_server, 204, 0).await;

        let file = source_file(20);
        let result = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(result.etag, "\"final-2\"");
        assert_eq!(complete_bodies(&mock_server).await.len(), 2);
    }

    #[tokio::test]
    async fn test_segment_failing_twice_aborts_with_upload_id() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;

        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .and(query_param("partNumber", "2"))
            .respond_with(ResponseTemplate::new(503))
            .with_priority(1)
            .expect(2)
            .mount(&mock_server)
            .await;
        mount_parts_ok(&mock_server).await;
        mount_abort(&mock_server, 204, 1).await;

        let file = source_file(30);
        let err = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap_err();

        match err {
            UploadError::Fatal { upload_id, source, .. } => {
                assert_eq!(upload_id, UPLOAD_ID);
                assert!(source.is_some());
            }
            other => panic!("expected fatal error, got {other:?}"),
        }
        assert!(complete_bodies(&mock_server).await.is_empty());
    }

    #[tokio::test]
    async fn test_abort_failure_propagates_original_error() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;

        Mock::given(method("PUT"))
            .and(path(KEY_PATH))
            .and(query_param("partNumber", "1"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&mock_server)
            .await;
        mount_parts_ok(&mock_server).await;
        mount_abort(&mock_server, 500, 1).await;

        let file = source_file(20);
        let err = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Fatal { .. }));
    }

    #[tokio::test]
    async fn test_completion_retried_then_aborted() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;
        mount_parts_ok(&mock_server).await;
        mount_list_parts(&mock_server, 2).await;

        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;
        mount_abort(&mock_server, 204, 1).await;

        let file = source_file(20);
        let err = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Fatal { .. }));
    }

    #[tokio::test]
    async fn test_missing_part_on_server_aborts() {
        let mock_server = MockServer::start().await;
        mount_initiate(&mock_server).await;
        mount_parts_ok(&mock_server).await;
        mount_list_parts(&mock_server, 2).await;

        Mock::given(method("POST"))
            .and(path(KEY_PATH))
            .and(query_param("uploadId", UPLOAD_ID))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
        mount_abort(&mock_server, 204, 1).await;

        let file = source_file(30);
        let err = create_uploader(&mock_server, 10)
            .upload_file(file.path(), "big.bin", &UploadOptions::default())
            .await
            .unwrap_err();

        match err {
            UploadError::Fatal { reason, .. } => assert!(reason.contains("missing part 3")),
            other => panic!("expected fatal error, got {other:?}"),
        }
    }
}
