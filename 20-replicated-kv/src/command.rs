use serde::{Deserialize, Serialize};

use crate::message::Request;

/// A write that is fanned out to peers after it has been applied locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    Put { key: String, value: String },
    Delete { key: String },
}

impl Mutation {
    /// Builds the wire request carrying this mutation.
    pub fn into_request(self, is_replica: bool) -> Request {
        match self {
            Mutation::Put { key, value } => Request::Put {
                key,
                value,
                is_replica,
            },
            Mutation::Delete { key } => Request::Delete { key, is_replica },
        }
    }
}
