use crate::domain::video::{VideoRecord, VideoStatus};
use crate::ports::metadata::{MetadataError, MetadataStore};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

/// Remote key-value metadata backend on DynamoDB. Items:
/// `id` (S, partition key), `uploaded_at` (S, RFC 3339), `status` (S).
#[derive(Clone)]
pub struct DynamoMetadata {
    client: Client,
    table_name: String,
}

impl DynamoMetadata {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<VideoRecord, MetadataError> {
    let id = item
        .get("id")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| MetadataError::Backend("item missing id attribute".into()))?;

    let uploaded_at = item
        .get("uploaded_at")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| MetadataError::Backend("item missing or invalid uploaded_at".into()))?;

    let status = item
        .get("status")
        .and_then(|v| v.as_s().ok())
        .map(|s| VideoStatus::from_str(s))
        .transpose()
        .map_err(|e| MetadataError::Backend(e.into()))?
        .unwrap_or(VideoStatus::Ready);

    Ok(VideoRecord {
        id,
        uploaded_at,
        status,
    })
}

#[async_trait]
impl MetadataStore for DynamoMetadata {
    async fn create_with_status(
        &self,
        id: &str,
        uploaded_at: DateTime<Utc>,
        status: VideoStatus,
    ) -> Result<(), MetadataError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("id", AttributeValue::S(id.to_string()))
            .item("uploaded_at", AttributeValue::S(uploaded_at.to_rfc3339()))
            .item("status", AttributeValue::S(status.as_str().to_string()))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Err(MetadataError::Conflict(id.to_string()))
                } else {
                    Err(MetadataError::Backend(Box::new(service_err)))
                }
            }
        }
    }

    async fn update_status(&self, id: &str, status: VideoStatus) -> Result<(), MetadataError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .update_expression("SET #status = :status")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":status",
                AttributeValue::S(status.as_str().to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Err(MetadataError::NotFound(id.to_string()))
                } else {
                    Err(MetadataError::Backend(Box::new(service_err)))
                }
            }
        }
    }

    async fn read(&self, id: &str) -> Result<Option<VideoRecord>, MetadataError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| MetadataError::Backend(Box::new(e.into_service_error())))?;

        resp.item.as_ref().map(record_from_item).transpose()
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, MetadataError> {
        let mut records = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| MetadataError::Backend(Box::new(e.into_service_error())))?;

            for item in resp.items() {
                records.push(record_from_item(item)?);
            }

            exclusive_start_key = resp.last_evaluated_key;
            if exclusive_start_key.is_none() {
                break;
            }
        }

        // DynamoDB scans are unordered; the contract is newest first.
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<(), MetadataError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .condition_expression("attribute_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Err(MetadataError::NotFound(id.to_string()))
                } else {
                    Err(MetadataError::Backend(Box::new(service_err)))
                }
            }
        }
    }
}
