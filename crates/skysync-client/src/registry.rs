use std::collections::HashMap;
use std::sync::Arc;

use skysync_domain::DriveType;

use crate::baidu::BaiduClient;
use crate::client::DriveClient;
use crate::error::ClientError;
use crate::quark::QuarkClient;

type ClientBuilder =
    Arc<dyn Fn(&str) -> Result<Arc<dyn DriveClient>, ClientError> + Send + Sync>;

/// Builds [`DriveClient`] instances from stored credential blobs, keyed by
/// provider tag. Tests register their own builders to substitute fakes.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    builders: HashMap<DriveType, ClientBuilder>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every production adapter registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(DriveType::Baidu, |cookies| {
            Ok(Arc::new(BaiduClient::new(cookies)?) as Arc<dyn DriveClient>)
        });
        registry.register(DriveType::Quark, |cookies| {
            Ok(Arc::new(QuarkClient::new(cookies)?) as Arc<dyn DriveClient>)
        });
        registry
    }

    pub fn register<F>(&mut self, kind: DriveType, builder: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Arc<dyn DriveClient>, ClientError> + Send + Sync + 'static,
    {
        self.builders.insert(kind, Arc::new(builder));
        self
    }

    /// Construct a client for `kind` from an opaque credential blob.
    pub fn connect(
        &self,
        kind: DriveType,
        cookies: &str,
    ) -> Result<Arc<dyn DriveClient>, ClientError> {
        let builder = self
            .builders
            .get(&kind)
            .ok_or(ClientError::NotConfigured(kind))?;
        builder(cookies)
    }

    pub fn active_drives(&self) -> Vec<DriveType> {
        self.builders.keys().copied().collect()
    }
}
