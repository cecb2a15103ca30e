//! Helpers shared by the DynamoDB repositories. Every document type carries a
//! `version` attribute; updates are conditional puts on that attribute.

use std::collections::HashMap;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};

use crate::repositories::errors::RepositoryError;

pub type Item = HashMap<String, AttributeValue>;

pub fn string_key(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

/// Inserts `document`, failing with `AlreadyExists` if `key_attribute` is taken.
pub async fn put_new<T: Serialize>(
    client: &Client,
    table_name: &str,
    key_attribute: &str,
    document: &T,
) -> Result<(), RepositoryError> {
    let item: Item = to_item(document)?;

    let result = client
        .put_item()
        .table_name(table_name)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(#pk)")
        .expression_attribute_names("#pk", key_attribute)
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(SdkError::ServiceError(service_err))
            if service_err.err().is_conditional_check_failed_exception() =>
        {
            Err(RepositoryError::AlreadyExists)
        }
        Err(e) => Err(RepositoryError::DynamoDb(e.to_string())),
    }
}

/// Replaces `document` only if the stored copy is still at `expected_version`.
pub async fn put_versioned<T: Serialize>(
    client: &Client,
    table_name: &str,
    document: &T,
    expected_version: u64,
) -> Result<(), RepositoryError> {
    let item: Item = to_item(document)?;

    let result = client
        .put_item()
        .table_name(table_name)
        .set_item(Some(item))
        .condition_expression("#version = :expected")
        .expression_attribute_names("#version", "version")
        .expression_attribute_values(":expected", AttributeValue::N(expected_version.to_string()))
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(SdkError::ServiceError(service_err))
            if service_err.err().is_conditional_check_failed_exception() =>
        {
            Err(RepositoryError::VersionConflict)
        }
        Err(e) => Err(RepositoryError::DynamoDb(e.to_string())),
    }
}

/// Unconditional upsert.
pub async fn put<T: Serialize>(
    client: &Client,
    table_name: &str,
    document: &T,
) -> Result<(), RepositoryError> {
    let item: Item = to_item(document)?;
    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(item))
        .send()
        .await
        .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
    Ok(())
}

pub async fn get<T: DeserializeOwned>(
    client: &Client,
    table_name: &str,
    key: Item,
) -> Result<Option<T>, RepositoryError> {
    let output = client
        .get_item()
        .table_name(table_name)
        .set_key(Some(key))
        .consistent_read(true)
        .send()
        .await
        .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

    match output.item {
        Some(item) => Ok(Some(from_item(item)?)),
        None => Ok(None),
    }
}

pub async fn delete(client: &Client, table_name: &str, key: Item) -> Result<(), RepositoryError> {
    client
        .delete_item()
        .table_name(table_name)
        .set_key(Some(key))
        .send()
        .await
        .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
    Ok(())
}

/// Queries `attribute = value`, on the table itself or on a secondary index.
pub async fn query_eq<T: DeserializeOwned>(
    client: &Client,
    table_name: &str,
    index_name: Option<&str>,
    attribute: &str,
    value: &str,
) -> Result<Vec<T>, RepositoryError> {
    let mut documents = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let output = client
            .query()
            .table_name(table_name)
            .set_index_name(index_name.map(str::to_string))
            .key_condition_expression("#attr = :value")
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_values(":value", string_key(value))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        for item in output.items.unwrap_or_default() {
            documents.push(from_item(item)?);
        }

        match output.last_evaluated_key {
            Some(key) if !key.is_empty() => start_key = Some(key),
            _ => break,
        }
    }

    Ok(documents)
}

pub async fn scan<T: DeserializeOwned>(
    client: &Client,
    table_name: &str,
) -> Result<Vec<T>, RepositoryError> {
    let mut documents = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let output = client
            .scan()
            .table_name(table_name)
            .set_exclusive_start_key(start_key.take())
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        for item in output.items.unwrap_or_default() {
            documents.push(from_item(item)?);
        }

        match output.last_evaluated_key {
            Some(key) if !key.is_empty() => start_key = Some(key),
            _ => break,
        }
    }

    Ok(documents)
}
