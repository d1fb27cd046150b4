use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{Record, Table};

/// A persisted row type. Serialization goes through JSON so the same
/// entity round-trips through both store backends.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    fn id(&self) -> Uuid;

    /// Owning tenant, None for root entities
    fn tenant_id(&self) -> Option<Uuid> {
        None
    }

    fn set_tenant_id(&mut self, _tenant_id: Uuid) {}

    fn touch(&mut self, now: DateTime<Utc>);

    fn to_record(&self) -> Result<Record, DatabaseError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(DatabaseError::QueryError(format!("{} did not serialize to an object", Self::TABLE.name))),
        }
    }

    fn from_record(record: Record) -> Result<Self, DatabaseError> {
        Ok(serde_json::from_value(serde_json::Value::Object(record))?)
    }
}
