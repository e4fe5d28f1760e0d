use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::datastore::Record;

/// Document wrapper storing a row under its primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRecord<T> {
    #[serde(rename = "_id")]
    key: String,
    #[serde(flatten)]
    row: T,
}

impl<T: Record> MongoRecord<T> {
    pub fn new(row: T) -> Self {
        Self {
            key: row.id().to_string(),
            row,
        }
    }

    pub fn into_row(self) -> T {
        self.row
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
