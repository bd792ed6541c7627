//! HTTP implementation of the annotation API.

use marginalia_core::{
    AnnotationApi, AnnotationError, AnnotationPatch, AnnotationRecord, ApiResponse,
    CreateAnnotationRecord, EntityRef,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Config;
use crate::error::MarginaliaError;

#[derive(Debug, Clone)]
pub struct HttpAnnotationApi {
    pub client: reqwest::Client,
    base: Url,
}

impl HttpAnnotationApi {
    pub fn new(base_url: &str) -> Result<Self, MarginaliaError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, MarginaliaError> {
        let mut base = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    pub fn from_config(config: &Config) -> Result<Self, MarginaliaError> {
        #[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;
        #[cfg(all(target_family = "wasm", target_os = "unknown"))]
        let client = reqwest::Client::new();
        Self::with_client(client, &config.api_url)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn list_url(&self, entity: &EntityRef) -> Result<Url, MarginaliaError> {
        let mut url = self.base.join("annotation/list")?;
        url.query_pairs_mut()
            .append_pair("entity_uuid", &entity.uuid)
            .append_pair("entity_type", &entity.kind);
        Ok(url)
    }

    pub fn item_url(&self, id: &str) -> Result<Url, MarginaliaError> {
        let mut url = self.base.join("annotation")?;
        url.path_segments_mut()
            .map_err(|_| MarginaliaError::Config(format!("{} cannot be a base URL", self.base)))?
            .push(id);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, MarginaliaError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(MarginaliaError::Api {
                code: i64::from(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl AnnotationApi for HttpAnnotationApi {
    async fn list(&self, entity: &EntityRef) -> Result<ApiResponse<Vec<AnnotationRecord>>, AnnotationError> {
        let url = self.list_url(entity)?;
        tracing::debug!(%url, "listing annotations");
        Ok(self.send(self.client.get(url)).await?)
    }

    async fn create(&self, record: &CreateAnnotationRecord) -> Result<ApiResponse<AnnotationRecord>, AnnotationError> {
        let url = self.base.join("annotation").map_err(MarginaliaError::from)?;
        Ok(self.send(self.client.post(url).json(record)).await?)
    }

    async fn update(&self, id: &str, patch: &AnnotationPatch) -> Result<ApiResponse<AnnotationRecord>, AnnotationError> {
        let url = self.item_url(id)?;
        Ok(self.send(self.client.put(url).json(patch)).await?)
    }

    async fn delete(&self, id: &str) -> Result<ApiResponse<serde_json::Value>, AnnotationError> {
        let url = self.item_url(id)?;
        Ok(self.send(self.client.delete(url)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_keep_base_path() {
        let api = HttpAnnotationApi::new("http://localhost:8080/api/v1").unwrap();
        let entity = EntityRef::new("3f2a", "article");
        assert_eq!(
            api.list_url(&entity).unwrap().as_str(),
            "http://localhost:8080/api/v1/annotation/list?entity_uuid=3f2a&entity_type=article"
        );
        assert_eq!(
            api.item_url("9c1e-04").unwrap().as_str(),
            "http://localhost:8080/api/v1/annotation/9c1e-04"
        );
    }

    #[test]
    fn test_item_url_escapes_id() {
        let api = HttpAnnotationApi::new("http://localhost:8080/api/v1/").unwrap();
        assert_eq!(
            api.item_url("a b/c").unwrap().as_str(),
            "http://localhost:8080/api/v1/annotation/a%20b%2Fc"
        );
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(matches!(
            HttpAnnotationApi::new("not a url"),
            Err(MarginaliaError::Url(_))
        ));
    }
}
