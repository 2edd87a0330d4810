//! `FeatureFlagProvider` backed by an optional external flag service
//! (`CheckFeature(userId, featureId) → allowed`, spec.md §6). When no
//! service is configured every feature is treated as enabled — a
//! self-hosted deployment with no flag backend still gets the guard engine.

use inbound_core::pipeline::FeatureFlagProvider;

pub struct HttpFeatureFlagProvider {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpFeatureFlagProvider {
    pub fn new(base_url: Option<String>) -> Self {
        HttpFeatureFlagProvider {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl FeatureFlagProvider for HttpFeatureFlagProvider {
    async fn is_enabled(&self, user_id: &str, feature_id: &str) -> bool {
        let Some(base_url) = &self.base_url else {
            return true;
        };

        #[derive(serde::Deserialize)]
        struct CheckFeatureResponse {
            allowed: bool,
        }

        let url = format!("{base_url}/{user_id}/{feature_id}");

        let result = self.client.get(&url).send().await;

        match result {
            Ok(response) => response
                .json::<CheckFeatureResponse>()
                .await
                .map(|body| body.allowed)
                .unwrap_or(false),
            Err(err) => {
                tracing::warn!(%url, error = %err, "feature flag check failed, treating as disabled");
                false
            }
        }
    }
}
