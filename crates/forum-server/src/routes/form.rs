//! Multipart form reading shared by the post and comment routes.

use axum::extract::Multipart;
use std::collections::HashMap;

use crate::error::ApiError;

/// Name of the file field carrying an optional image
const IMAGE_FIELD: &str = "image";

/// Text fields plus the raw bytes of the optional `image` part
#[derive(Debug, Default)]
pub struct SubmittedForm {
    fields: HashMap<String, String>,
    pub image: Vec<u8>,
}

impl SubmittedForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed form: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == IMAGE_FIELD {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable image: {}", e)))?;
                form.image = bytes.to_vec();
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable field {}: {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Text field value, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Optional integer field; blank counts as absent
    pub fn optional_id(&self, name: &str) -> Result<Option<i64>, ApiError> {
        match self.fields.get(name).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("{} must be an integer", name))),
        }
    }
}
