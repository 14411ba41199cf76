use async_trait::async_trait;
use mockito::Server;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio_util::sync::CancellationToken;
use tuyadl::{
    Credentials, Error, ErrorKind, MediaReference, Payload, Pipeline, Region, Transport,
    resolver::{ApiError, CloudApi, FileRequest, StrategyKind},
};

const PAYLOAD: &str = r#"{"bucket":"b1","files":[["/img/a.jpg","0123456789abcdef"]]}"#;
const IV: [u8; 16] = *b"fedcba9876543210";
const PLAINTEXT: &[u8] = b"tuya doorbell snapshot!!";

// openssl enc -aes-128-cbc -K 30313233343536373839616263646566 -iv 66656463626139383736353433323130
const CIPHERTEXT: [u8; 32] = [
    0x5e, 0x25, 0xd8, 0x41, 0xd6, 0xd0, 0xc1, 0x3c, 0x9c, 0x99, 0xe6, 0x46, 0xf2, 0x30, 0xcb, 0x32,
    0x18, 0xdb, 0x47, 0x4a, 0xaa, 0x1a, 0x87, 0xed, 0x00, 0xf7, 0x33, 0x04, 0x9a, 0x5f, 0x8a, 0xee,
];

fn envelope() -> Vec<u8> {
    let mut data = vec![0xa5_u8; 64];
    data[4..20].copy_from_slice(&IV);
    data.extend_from_slice(&CIPHERTEXT);
    data
}

fn reference(region: Region) -> MediaReference {
    MediaReference::new(
        Payload::decode(PAYLOAD).unwrap(),
        "dev1".to_owned(),
        region,
        Credentials::default(),
    )
}

/// Serves one body for every url and remembers what was asked for.
struct StaticTransport {
    body: Result<Vec<u8>, u16>,
    urls: Mutex<Vec<String>>,
}

impl StaticTransport {
    fn new(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body: Ok(body),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            body: Err(status),
            urls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn get(&self, url: &str) -> tuyadl::Result<Vec<u8>> {
        self.urls.lock().unwrap().push(url.to_owned());

        match &self.body {
            Ok(x) => Ok(x.clone()),
            Err(status) => Err(Error::DownloadFailed {
                status: Some(reqwest::StatusCode::from_u16(*status).unwrap()),
                message: url.to_owned(),
            }),
        }
    }
}

struct SignedApi {
    url: String,
    calls: AtomicUsize,
}

#[async_trait]
impl CloudApi for SignedApi {
    async fn signed_url(&self, request: &FileRequest<'_>) -> Result<Option<String>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.device_id, "dev1");
        assert_eq!(request.bucket, "b1");
        Ok(Some(self.url.clone()))
    }

    async fn file_url(&self, _: &FileRequest<'_>) -> Result<Option<String>, ApiError> {
        Err(ApiError::Rejected("not supported".to_owned()))
    }
}

#[tokio::test]
async fn test_direct_region_end_to_end() {
    let transport = StaticTransport::new(envelope());
    let pipeline = Pipeline::builder(transport.clone())
        .strategies(vec![StrategyKind::DirectRegionUrl])
        .build();

    let media = pipeline
        .process(&reference(Region::EuCentral1), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(media.data, PLAINTEXT);
    assert_eq!(
        media.metadata.resolved_url,
        "https://b1.oss-eu-central-1.aliyuncs.com/img/a.jpg"
    );
    assert_eq!(media.metadata.strategy, StrategyKind::DirectRegionUrl);
    assert_eq!(media.metadata.bucket, "b1");
    assert_eq!(media.metadata.file_path, "/img/a.jpg");
    assert_eq!(media.metadata.region, Region::EuCentral1);
    assert_eq!(
        *transport.urls.lock().unwrap(),
        vec!["https://b1.oss-eu-central-1.aliyuncs.com/img/a.jpg".to_owned()]
    );
}

#[tokio::test]
async fn test_signed_url_over_http() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/signed/a.jpg")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(envelope())
        .create_async()
        .await;

    let api = Arc::new(SignedApi {
        url: format!("{}/signed/a.jpg?Signature=abc", server.url()),
        calls: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::http(reqwest::Client::new())
        .api(api.clone())
        .build();

    let media = pipeline
        .process(&reference(Region::UsEast1), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(media.data, PLAINTEXT);
    assert_eq!(media.metadata.strategy, StrategyKind::SignedUrlApi);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    assert!(media.base64().starts_with("dHV5YSBkb29yYmVsbC"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_forbidden_is_distinct_from_server_error() {
    let cancel = CancellationToken::new();

    for (status, denied) in [(403, true), (500, false)] {
        let pipeline = Pipeline::builder(StaticTransport::status(status))
            .strategies(vec![StrategyKind::DirectRegionUrl])
            .build();
        let error = pipeline
            .process(&reference(Region::EuCentral1), &cancel)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::DownloadFailed);
        assert_eq!(error.status().map(|x| x.as_u16()), Some(status));
        assert_eq!(error.is_access_denied(), denied);
    }
}

#[tokio::test]
async fn test_wrong_key_is_crypto_failure() {
    let mut reference = reference(Region::EuCentral1);
    reference.key = b"abcdef0123456789".to_vec();

    let pipeline = Pipeline::builder(StaticTransport::new(envelope()))
        .strategies(vec![StrategyKind::DirectRegionUrl])
        .build();

    // A wrong key can pass the padding check by chance; it can never yield the plaintext.
    match pipeline.process(&reference, &CancellationToken::new()).await {
        Err(e) => assert_eq!(e.kind(), ErrorKind::PaddingInvalid),
        Ok(media) => assert_ne!(media.data, PLAINTEXT),
    }
}

#[tokio::test]
async fn test_invalid_key_length_after_download() {
    let mut reference = reference(Region::EuCentral1);
    reference.key = b"0123456789".to_vec();

    let transport = StaticTransport::new(envelope());
    let pipeline = Pipeline::builder(transport.clone())
        .strategies(vec![StrategyKind::DirectRegionUrl])
        .build();
    let error = pipeline
        .process(&reference, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidKeyLength);
    assert_eq!(transport.urls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_short_download() {
    let pipeline = Pipeline::builder(StaticTransport::new(vec![0_u8; 70]))
        .strategies(vec![StrategyKind::DirectRegionUrl])
        .build();
    let error = pipeline
        .process(&reference(Region::EuCentral1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::EnvelopeTooSmall);
}

#[tokio::test]
async fn test_strict_header() {
    let pipeline = Pipeline::builder(StaticTransport::new(envelope()))
        .strategies(vec![StrategyKind::DirectRegionUrl])
        .header_magic(*b"TUYA")
        .build();
    let error = pipeline
        .process(&reference(Region::EuCentral1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::HeaderMismatch);
}

#[tokio::test]
async fn test_no_strategy_skips_download() {
    let transport = StaticTransport::new(envelope());
    let pipeline = Pipeline::builder(transport.clone())
        .strategies(vec![
            StrategyKind::SignedUrlApi,
            StrategyKind::DeviceFileUrlApi,
            StrategyKind::DirectRegionUrl,
        ])
        .build();

    let error = pipeline
        .process(
            &reference(Region::Other("mars-north-1".to_owned())),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let Error::NoStrategySucceeded { declines } = &error else {
        panic!("unexpected error: {}", error);
    };
    assert_eq!(declines.len(), 3);
    assert!(transport.urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fallback_is_reported() {
    let pipeline = Pipeline::builder(StaticTransport::new(envelope()))
        .strategies(vec![
            StrategyKind::DirectRegionUrl,
            StrategyKind::FallbackGuessUrl,
        ])
        .build();

    let media = pipeline
        .process(
            &reference(Region::Other("mars-north-1".to_owned())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(media.metadata.strategy, StrategyKind::FallbackGuessUrl);
    assert_eq!(
        media.metadata.region,
        Region::Other("mars-north-1".to_owned())
    );
    assert_eq!(media.data, PLAINTEXT);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let transport = StaticTransport::new(envelope());
    let pipeline = Pipeline::builder(transport.clone()).build();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let error = pipeline
        .process(&reference(Region::EuCentral1), &cancel)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert!(transport.urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_payload_before_network() {
    let error = Payload::decode(r#"{"bucket":"b1","files":[]}"#).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidPayload);
}
