//! S3-compatible blob store over plain HTTP (path-style addressing)

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::{header, Client, RequestBuilder, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

use super::{BlobStore, StoreError};

/// Objects are addressed as `<endpoint>/<bucket>/<key>`
///
/// Listing uses the `list-type=2` query and follows continuation tokens.
/// An optional bearer token is sent on every request.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Unavailable(format!("invalid endpoint {}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "endpoint {} cannot hold object paths",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("msgdesk-review/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            bucket: bucket.to_string(),
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Unavailable(format!("bad endpoint {}", self.endpoint)))?;
            path.pop_if_empty();
            for segment in segments {
                if segment.is_empty() {
                    return Err(StoreError::InvalidKey(String::new()));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_connection(&self) -> bool {
        let url = match self.url(&[&self.bucket]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.authorize(self.client.head(url)).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(status = %resp.status(), "Blob store bucket probe rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "Blob store unreachable");
                false
            }
        }
    }

    async fn list_files(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut url = self.url(&[&self.bucket])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2");
                if let Some(token) = &continuation {
                    query.append_pair("continuation-token", token);
                }
            }

            let resp = self.authorize(self.client.get(url)).send().await?;
            if !resp.status().is_success() {
                return Err(StoreError::Unavailable(format!(
                    "list {} returned {}",
                    self.bucket,
                    resp.status()
                )));
            }
            let body = resp.text().await?;

            let (keys, truncated, next) = parse_listing(&body)?;
            names.extend(keys);
            continuation = next;
            if !truncated || continuation.is_none() {
                break;
            }
        }

        names.sort();
        Ok(names)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(&[&self.bucket, key])?;
        let resp = self.authorize(self.client.get(url)).send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            status if status.is_success() => Ok(resp.bytes().await?.to_vec()),
            status => Err(StoreError::Unavailable(format!("get {} returned {}", key, status))),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let url = self.url(&[bucket, key])?;
        let size = body.len();
        let resp = self
            .authorize(self.client.put(url))
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "put {}/{} returned {}",
                bucket,
                key,
                resp.status()
            )));
        }
        debug!(bucket, key, bytes = size, "Uploaded object");
        Ok(())
    }
}

/// Text content of every element whose local name is `tag`,
/// entity-decoded; namespace prefixes and attributes are ignored
fn xml_values(xml: &str, tag: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut values = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == tag.as_bytes() => {
                current = Some(String::new());
            }
            Event::Empty(e) if e.local_name().as_ref() == tag.as_bytes() => {
                values.push(String::new());
            }
            Event::Text(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(e) if e.local_name().as_ref() == tag.as_bytes() => {
                if let Some(value) = current.take() {
                    values.push(value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(values)
}

/// Keys, truncation flag and continuation token of one listing page
fn parse_listing(xml: &str) -> Result<(Vec<String>, bool, Option<String>), StoreError> {
    let malformed = |e: quick_xml::Error| StoreError::Unavailable(format!("malformed listing: {}", e));

    let keys = xml_values(xml, "Key").map_err(malformed)?;
    let truncated = xml_values(xml, "IsTruncated")
        .map_err(malformed)?
        .first()
        .is_some_and(|v| v.trim() == "true");
    let continuation = xml_values(xml, "NextContinuationToken")
        .map_err(malformed)?
        .into_iter()
        .next();
    Ok((keys, truncated, continuation))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>monitoria-data</Name>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>telegram_messages.json</Key><Size>10</Size></Contents>
  <Contents><Key>a &amp; b.csv</Key><Size>3</Size></Contents>
</ListBucketResult>"#;

    #[test]
    fn test_xml_keys() {
        assert_eq!(
            xml_values(LISTING, "Key").unwrap(),
            vec!["telegram_messages.json".to_string(), "a & b.csv".to_string()]
        );
        assert_eq!(xml_values(LISTING, "IsTruncated").unwrap(), vec!["false".to_string()]);
        assert!(xml_values(LISTING, "NextContinuationToken").unwrap().is_empty());
    }

    #[test]
    fn test_listing_with_namespaces_and_attributes() {
        let listing = r#"<?xml version="1.0" encoding="UTF-8"?>
<s3:ListBucketResult xmlns:s3="http://s3.amazonaws.com/doc/2006-03-01/">
  <s3:IsTruncated>true</s3:IsTruncated>
  <s3:NextContinuationToken>tok&amp;2</s3:NextContinuationToken>
  <s3:Contents><s3:Key class="object">telegram_messages.json</s3:Key></s3:Contents>
  <s3:Contents><s3:Key><![CDATA[raw <dump>.csv]]></s3:Key></s3:Contents>
</s3:ListBucketResult>"#;

        let (keys, truncated, continuation) = parse_listing(listing).unwrap();
        assert_eq!(
            keys,
            vec!["telegram_messages.json".to_string(), "raw <dump>.csv".to_string()]
        );
        assert!(truncated);
        assert_eq!(continuation, Some("tok&2".to_string()));
    }

    #[test]
    fn test_malformed_listing_is_error() {
        let err = parse_listing("<ListBucketResult><Key>a</Wrong></ListBucketResult>").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_object_urls_are_path_style() {
        let store = HttpBlobStore::new(
            "http://localhost:9000/",
            "monitoria-data",
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        let url = store.url(&["monitoria-data", "telegram messages.json"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/monitoria-data/telegram%20messages.json"
        );
        assert!(store.url(&["monitoria-data", ""]).is_err());
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(HttpBlobStore::new("not a url", "b", None, Duration::from_secs(1)).is_err());
        assert!(HttpBlobStore::new("mailto:x@y", "b", None, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_probe_is_false() {
        // Port 9 (discard) on localhost is closed in test environments
        let store = HttpBlobStore::new(
            "http://127.0.0.1:9",
            "bucket",
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(!store.check_connection().await);
    }
}
