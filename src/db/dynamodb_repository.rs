use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::SwapRecord;

#[derive(Clone)]
pub struct SwapRepository {
    client: Client,
    swaps_table: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Record not found")]
    NotFound,
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

impl SwapRepository {
    pub fn new(client: Client, swaps_table: String) -> Self {
        Self {
            client,
            swaps_table,
        }
    }

    pub async fn create_record(&self, record: &SwapRecord) -> Result<(), RepositoryError> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(record.id.to_string()));
        item.insert(
            "result_url".to_string(),
            AttributeValue::S(record.result_url.clone()),
        );
        item.insert(
            "media_public_id".to_string(),
            AttributeValue::S(record.media_public_id.clone()),
        );
        item.insert(
            "media_url".to_string(),
            AttributeValue::S(record.media_url.clone()),
        );
        item.insert(
            "width".to_string(),
            AttributeValue::N(record.width.to_string()),
        );
        item.insert(
            "height".to_string(),
            AttributeValue::N(record.height.to_string()),
        );
        item.insert(
            "format".to_string(),
            AttributeValue::S(record.format.clone()),
        );
        item.insert(
            "media_bytes".to_string(),
            AttributeValue::N(record.media_bytes.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(record.created_at.to_rfc3339()),
        );

        match self
            .client
            .put_item()
            .table_name(&self.swaps_table)
            .set_item(Some(item))
            .send()
            .await
        {
            Ok(_) => {
                log::info!("Stored swap record {}", record.id);
                Ok(())
            }
            Err(e) => {
                log::error!("DynamoDB put_item failed for record {}: {:?}", record.id, e);
                Err(RepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    pub async fn get_record(&self, id: Uuid) -> Result<Option<SwapRecord>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(id.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.swaps_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            Ok(Some(self.parse_record_from_item(item)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_existing_record(&self, id: Uuid) -> Result<SwapRecord, RepositoryError> {
        match self.get_record(id).await? {
            Some(record) => Ok(record),
            None => Err(RepositoryError::NotFound),
        }
    }

    pub async fn list_records(&self) -> Result<Vec<SwapRecord>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.swaps_table)
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut records = Vec::new();
        if let Some(items) = result.items {
            for item in items {
                records.push(self.parse_record_from_item(item)?);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub async fn delete_record(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(id.to_string()));

        self.client
            .delete_item()
            .table_name(&self.swaps_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    pub async fn count_records(&self) -> Result<i64, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.swaps_table)
            .select(Select::Count)
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(result.count as i64)
    }

    fn parse_record_from_item(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> Result<SwapRecord, RepositoryError> {
        let id = item
            .get("id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid id".to_string()))?;

        let result_url = item
            .get("result_url")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid result_url".to_string()))?
            .clone();

        let media_public_id = item
            .get("media_public_id")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid media_public_id".to_string()))?
            .clone();

        let media_url = item
            .get("media_url")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid media_url".to_string()))?
            .clone();

        let width = item
            .get("width")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid width".to_string()))?;

        let height = item
            .get("height")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid height".to_string()))?;

        let format = item
            .get("format")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid format".to_string()))?
            .clone();

        let media_bytes = item
            .get("media_bytes")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid media_bytes".to_string()))?;

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

        Ok(SwapRecord {
            id,
            result_url,
            media_public_id,
            media_url,
            width,
            height,
            format,
            media_bytes,
            created_at,
        })
    }
}
