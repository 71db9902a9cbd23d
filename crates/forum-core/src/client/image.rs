//! Image store on a bucketed HTTP object storage.
//!
//! Each session owns one bucket `user-{id}`; objects inside it are named by
//! a random alphanumeric code.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::{http_client, trim_base};
use crate::error::{Error, Result};
use crate::ports::ImageStore;

pub struct HttpImageStore {
    http: reqwest::Client,
    base_url: String,
    code_length: usize,
}

impl HttpImageStore {
    pub fn new(base_url: &str, code_length: usize) -> Result<Self> {
        if code_length == 0 {
            return Err(Error::invalid_input("object code length must be positive"));
        }
        Ok(Self {
            http: http_client()?,
            base_url: trim_base(base_url),
            code_length,
        })
    }

    fn bucket_url(&self, owner_id: i64) -> String {
        format!("{}/user-{}", self.base_url, owner_id)
    }

    fn object_code(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.code_length)
            .map(char::from)
            .collect()
    }

    async fn put_object(&self, url: &str, data: Vec<u8>) -> Result<StatusCode> {
        let resp = self.http.put(url).body(data).send().await?;
        Ok(resp.status())
    }

    async fn create_bucket(&self, owner_id: i64) -> Result<()> {
        let url = self.bucket_url(owner_id);
        let status = self.http.put(&url).send().await?.status();
        if !status.is_success() {
            return Err(Error::ImageStorage(format!(
                "creating bucket user-{} returned {}",
                owner_id, status
            )));
        }
        info!(owner_id, "Created image bucket");
        Ok(())
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(&self, owner_id: i64, data: Vec<u8>) -> Result<String> {
        let code = self.object_code();
        let url = self.public_url(owner_id, &code);

        let mut status = self.put_object(&url, data.clone()).await?;
        if status == StatusCode::NOT_FOUND {
            debug!(owner_id, "Bucket missing, creating it");
            self.create_bucket(owner_id).await?;
            status = self.put_object(&url, data).await?;
        }

        if !status.is_success() {
            return Err(Error::ImageStorage(format!(
                "uploading {} returned {}",
                url, status
            )));
        }
        Ok(url)
    }

    fn public_url(&self, owner_id: i64, code: &str) -> String {
        format!("{}/{}", self.bucket_url(owner_id), code)
    }
}
