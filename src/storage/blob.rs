// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Blob container storage through OpenDAL.

use crate::errors::{StorageError, ValidationError};
use crate::storage::{join_key, PipelineStorage};
use async_trait::async_trait;
use opendal::{services, ErrorKind, Operator};
use std::collections::HashMap;
use std::sync::Arc;

/// How a blob container is authenticated.
#[derive(Debug, Clone, PartialEq)]
pub enum BlobCredentials {
    /// `DefaultEndpointsProtocol=...;AccountName=...;AccountKey=...;...`
    ConnectionString(String),
    /// Explicit endpoint plus either an account key or a SAS token.
    Endpoint {
        endpoint: String,
        account_name: Option<String>,
        account_key: Option<String>,
        sas_token: Option<String>,
    },
}

#[derive(Clone)]
pub struct BlobStorage {
    operator: Operator,
    container: String,
    prefix: String,
}

impl BlobStorage {
    /// Connects to `container`, failing fast when the container name or
    /// credentials are missing.
    pub fn new(
        container: &str,
        credentials: Option<BlobCredentials>,
        base_dir: Option<&str>,
    ) -> Result<Self, StorageError> {
        if container.trim().is_empty() {
            return Err(ValidationError::MissingContainerName {
                section: "storage".to_string(),
            }
            .into());
        }
        let missing = || ValidationError::MissingCredentials {
            container: container.to_string(),
        };

        let mut builder = services::Azblob::default().container(container);
        match credentials.ok_or_else(missing)? {
            BlobCredentials::ConnectionString(conn) => {
                let parts = parse_connection_string(&conn);
                let account_name = parts.get("accountname").ok_or_else(missing)?;
                builder = builder.account_name(account_name);
                if let Some(key) = parts.get("accountkey") {
                    builder = builder.account_key(key);
                }
                if let Some(sas) = parts.get("sharedaccesssignature") {
                    builder = builder.sas_token(sas);
                }
                builder = builder.endpoint(&connection_endpoint(&parts, account_name));
            }
            BlobCredentials::Endpoint {
                endpoint,
                account_name,
                account_key,
                sas_token,
            } => {
                if account_key.is_none() && sas_token.is_none() {
                    return Err(missing().into());
                }
                builder = builder.endpoint(&endpoint);
                if let Some(name) = account_name.as_deref() {
                    builder = builder.account_name(name);
                }
                if let Some(key) = account_key.as_deref() {
                    builder = builder.account_key(key);
                }
                if let Some(sas) = sas_token.as_deref() {
                    builder = builder.sas_token(sas);
                }
            }
        }

        let operator = Operator::new(builder)?.finish();
        Ok(Self {
            operator,
            container: container.to_string(),
            prefix: base_dir.unwrap_or_default().trim_matches('/').to_string(),
        })
    }

    /// Wraps an already configured operator.
    pub fn from_operator(operator: Operator, container: impl Into<String>) -> Self {
        Self {
            operator,
            container: container.into(),
            prefix: String::new(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        join_key(&self.prefix, key)
    }
}

fn parse_connection_string(conn: &str) -> HashMap<String, String> {
    conn.split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect()
}

fn connection_endpoint(parts: &HashMap<String, String>, account_name: &str) -> String {
    if let Some(endpoint) = parts.get("blobendpoint") {
        return endpoint.trim_end_matches('/').to_string();
    }
    let protocol = parts
        .get("defaultendpointsprotocol")
        .map(String::as_str)
        .unwrap_or("https");
    let suffix = parts
        .get("endpointsuffix")
        .map(String::as_str)
        .unwrap_or("core.windows.net");
    format!("{}://{}.blob.{}", protocol, account_name, suffix)
}

#[async_trait]
impl PipelineStorage for BlobStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.operator.read(&self.full_key(key)).await {
            Ok(buffer) => Ok(Some(buffer.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.operator
            .write(&self.full_key(key), value.to_vec())
            .await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.operator.exists(&self.full_key(key)).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator.delete(&self.full_key(key)).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for key in self.list_keys(None).await? {
            self.delete(&key).await?;
        }
        Ok(())
    }

    async fn list_keys(&self, base_dir: Option<&str>) -> Result<Vec<String>, StorageError> {
        let scope = match base_dir {
            Some(dir) => self.full_key(dir),
            None => self.prefix.clone(),
        };
        let dir = if scope.is_empty() {
            String::new()
        } else {
            format!("{}/", scope)
        };
        let strip = if self.prefix.is_empty() {
            0
        } else {
            self.prefix.len() + 1
        };

        let entries = match self.operator.list_with(&dir).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys: Vec<String> = entries
            .into_iter()
            .filter(|entry| !entry.path().ends_with('/'))
            .filter_map(|entry| {
                let path = entry.path().trim_start_matches('/');
                path.get(strip..).map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn child(&self, name: &str) -> Result<Arc<dyn PipelineStorage>, StorageError> {
        Ok(Arc::new(Self {
            operator: self.operator.clone(),
            container: self.container.clone(),
            prefix: self.full_key(name),
        }))
    }

    fn describe(&self) -> String {
        format!("blob://{}/{}", self.container, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backed() -> BlobStorage {
        let operator = Operator::new(services::Memory::default())
            .unwrap()
            .finish();
        BlobStorage::from_operator(operator, "test")
    }

    #[tokio::test]
    async fn test_operations_through_operator() {
        let storage = memory_backed();
        assert_eq!(storage.get("a.txt").await.unwrap(), None);

        storage.set("docs/a.txt", b"alpha").await.unwrap();
        storage.set("docs/b.txt", b"beta").await.unwrap();
        assert!(storage.has("docs/a.txt").await.unwrap());
        assert_eq!(
            storage.list_keys(Some("docs")).await.unwrap(),
            vec!["docs/a.txt".to_string(), "docs/b.txt".to_string()]
        );

        let child = storage.child("docs").unwrap();
        assert_eq!(child.get("b.txt").await.unwrap(), Some(b"beta".to_vec()));

        storage.clear().await.unwrap();
        assert!(!storage.has("docs/a.txt").await.unwrap());
    }

    #[test]
    fn test_missing_container_and_credentials_fail_fast() {
        assert!(matches!(
            BlobStorage::new("", None, None),
            Err(StorageError::Config(ValidationError::MissingContainerName { .. }))
        ));
        assert!(matches!(
            BlobStorage::new("data", None, None),
            Err(StorageError::Config(ValidationError::MissingCredentials { .. }))
        ));
        let endpoint_only = BlobCredentials::Endpoint {
            endpoint: "https://acct.blob.core.windows.net".to_string(),
            account_name: Some("acct".to_string()),
            account_key: None,
            sas_token: None,
        };
        assert!(matches!(
            BlobStorage::new("data", Some(endpoint_only), None),
            Err(StorageError::Config(ValidationError::MissingCredentials { .. }))
        ));
    }

    #[test]
    fn test_connection_string_endpoint() {
        let parts = parse_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
        );
        assert_eq!(parts.get("accountkey"), Some(&"a2V5".to_string()));
        assert_eq!(
            connection_endpoint(&parts, "acct"),
            "https://acct.blob.core.windows.net"
        );

        let local = parse_connection_string(
            "AccountName=devstoreaccount1;AccountKey=a2V5;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1/",
        );
        assert_eq!(
            connection_endpoint(&local, "devstoreaccount1"),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
    }
}
