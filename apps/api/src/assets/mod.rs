//! Asset Loader — resolves logo and signature references to image bytes.
//!
//! Two reference forms are accepted: `data:` URIs with a base64 payload
//! (decoded in place) and `http(s)://` URLs (fetched once, bounded by the
//! client timeout, never retried). Every failure is absorbed here and logged;
//! callers only ever see `None` and render the document without the image.

pub mod raster;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, warn};

pub use self::raster::{AssetFormat, ImageAsset};

/// Loader seam carried in `AppState` as `Arc<dyn AssetLoader>` so tests can
/// substitute a stub.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, reference: &str) -> Option<ImageAsset>;
}

/// Decodes `data:[<mime>][;base64],<payload>`. Only base64 payloads carry
/// binary images, so other encodings are rejected.
pub fn decode_data_uri(reference: &str) -> Option<Vec<u8>> {
    let rest = reference.trim().strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return None;
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Production loader backed by one shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpAssetLoader {
    client: Client,
    max_bytes: usize,
}

impl HttpAssetLoader {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, max_bytes })
    }

    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let mut response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, "Asset fetch failed: {e}");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Asset fetch returned non-success status");
            return None;
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                warn!(url, length, "Asset exceeds size cap, skipping");
                return None;
            }
        }

        let mut body = CappedBody::new(self.max_bytes);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if !body.extend(&chunk) {
                        warn!(url, limit = self.max_bytes, "Asset body exceeds size cap, skipping");
                        return None;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(url, "Asset body could not be read: {e}");
                    return None;
                }
            }
        }
        Some(body.into_inner())
    }
}

/// Response body accumulator that refuses to grow past `limit` bytes.
/// Chunked responses carry no `Content-Length`, so the cap is enforced while
/// reading.
#[derive(Debug)]
struct CappedBody {
    buf: Vec<u8>,
    limit: usize,
}

impl CappedBody {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    /// Returns `false` once the total would exceed the limit; the chunk is
    /// not kept in that case.
    fn extend(&mut self, chunk: &[u8]) -> bool {
        if self.buf.len() + chunk.len() > self.limit {
            return false;
        }
        self.buf.extend_from_slice(chunk);
        true
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    async fn load(&self, reference: &str) -> Option<ImageAsset> {
        let reference = reference.trim();
        let bytes = if reference.starts_with("data:") {
            let decoded = decode_data_uri(reference);
            if decoded.is_none() {
                warn!("Inline asset is not a base64 data URI, skipping");
            }
            decoded?
        } else if is_remote(reference) {
            self.fetch(reference).await?
        } else {
            debug!("Unsupported asset reference form, skipping");
            return None;
        };

        if bytes.len() > self.max_bytes {
            warn!(length = bytes.len(), "Inline asset exceeds size cap, skipping");
            return None;
        }

        let asset = ImageAsset::from_bytes(bytes);
        if asset.is_none() {
            warn!("Asset is not a decodable PNG, JPEG or GIF image, skipping");
        }
        asset
    }
}

#[cfg(test)]
mod tests {
    use super::raster::fixtures::png_bytes;
    use super::*;

    fn loader() -> HttpAssetLoader {
        HttpAssetLoader::new(Duration::from_secs(2), 1024 * 1024).unwrap()
    }

    fn data_uri(bytes: &[u8]) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(bytes))
    }

    #[test]
    fn test_decode_data_uri_base64() {
        assert_eq!(
            decode_data_uri("data:text/plain;base64,aGVsbG8="),
            Some(b"hello".to_vec())
        );
    }

    #[test]
    fn test_decode_data_uri_rejects_plain_encoding() {
        assert_eq!(decode_data_uri("data:text/plain,hello"), None);
        assert_eq!(decode_data_uri("data:image/png;base64"), None);
        assert_eq!(decode_data_uri("https://example.test/logo.png"), None);
    }

    #[tokio::test]
    async fn test_load_inline_png() {
        let asset = loader().load(&data_uri(&png_bytes(3, 5))).await.unwrap();
        assert_eq!((asset.width, asset.height), (3, 5));
        assert_eq!(asset.format, AssetFormat::Png);
    }

    #[tokio::test]
    async fn test_load_inline_non_image_is_absent() {
        let reference = data_uri(b"definitely not an image");
        assert!(loader().load(&reference).await.is_none());
    }

    #[tokio::test]
    async fn test_load_inline_over_cap_is_absent() {
        let tiny_cap = HttpAssetLoader::new(Duration::from_secs(2), 16).unwrap();
        assert!(tiny_cap.load(&data_uri(&png_bytes(16, 16))).await.is_none());
    }

    #[tokio::test]
    async fn test_load_unsupported_reference_is_absent() {
        assert!(loader().load("/var/uploads/logo.png").await.is_none());
        assert!(loader().load("ftp://example.test/logo.png").await.is_none());
        assert!(loader().load("").await.is_none());
    }

    #[test]
    fn test_capped_body_stops_at_limit() {
        let mut body = CappedBody::new(10);
        assert!(body.extend(b"hello"));
        assert!(body.extend(b"world"));
        assert!(!body.extend(b"!"));
        assert_eq!(body.into_inner(), b"helloworld".to_vec());
    }

    /// Serves `chunks` once as a chunked HTTP/1.1 response without a
    /// `Content-Length` header.
    async fn serve_chunked(chunks: Vec<Vec<u8>>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                let frame = [format!("{:X}\r\n", chunk.len()).into_bytes(), chunk, b"\r\n".to_vec()].concat();
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        format!("http://{addr}/logo.png")
    }

    #[tokio::test]
    async fn test_chunked_body_over_cap_is_absent() {
        let url = serve_chunked(vec![vec![0u8; 4096]; 8]).await;
        let capped = HttpAssetLoader::new(Duration::from_secs(2), 10_000).unwrap();
        assert!(capped.load(&url).await.is_none());
    }

    #[tokio::test]
    async fn test_chunked_png_within_cap_loads() {
        let png = png_bytes(6, 4);
        let (first, second) = png.split_at(png.len() / 2);
        let url = serve_chunked(vec![first.to_vec(), second.to_vec()]).await;

        let asset = loader().load(&url).await.unwrap();
        assert_eq!((asset.width, asset.height), (6, 4));
    }

    #[tokio::test]
    async fn test_load_unreachable_host_is_absent() {
        // Port 9 (discard) on loopback refuses connections.
        let asset = loader().load("http://127.0.0.1:9/logo.png").await;
        assert!(asset.is_none());
    }
}
