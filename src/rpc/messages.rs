use crate::core::{MetaError, Peer, RequestHeader, ResponseHeader, Result, TableId, TableName};
use crate::route::{Partition, TableRoute};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateRequest {
    pub header: Option<RequestHeader>,
    pub table_name: Option<TableName>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
    /// Opaque serialized table schema, stored as `Table::table_schema`.
    #[serde(default, with = "serde_bytes")]
    pub table_info: Vec<u8>,
}

impl CreateRequest {
    pub fn new(table_name: TableName, partitions: Vec<Partition>) -> Self {
        Self {
            header: None,
            table_name: Some(table_name),
            partitions,
            table_info: Vec::new(),
        }
    }

    pub fn with_header(mut self, header: RequestHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_table_info(mut self, table_info: Vec<u8>) -> Self {
        self.table_info = table_info;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteRequest {
    pub header: Option<RequestHeader>,
    #[serde(default)]
    pub table_names: Vec<TableName>,
    #[serde(default)]
    pub table_ids: Vec<TableId>,
}

impl RouteRequest {
    pub fn by_names(table_names: Vec<TableName>) -> Self {
        Self {
            table_names,
            ..Default::default()
        }
    }

    pub fn by_ids(table_ids: Vec<TableId>) -> Self {
        Self {
            table_ids,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, header: RequestHeader) -> Self {
        self.header = Some(header);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub header: Option<RequestHeader>,
    pub table_name: Option<TableName>,
    pub table_id: Option<TableId>,
}

impl DeleteRequest {
    pub fn by_name(table_name: TableName) -> Self {
        Self {
            table_name: Some(table_name),
            ..Default::default()
        }
    }

    pub fn by_id(table_id: TableId) -> Self {
        Self {
            table_id: Some(table_id),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, header: RequestHeader) -> Self {
        self.header = Some(header);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteResponse {
    pub header: Option<ResponseHeader>,
    #[serde(default)]
    pub peers: Vec<Peer>,
    #[serde(default)]
    pub table_routes: Vec<TableRoute>,
}

impl RouteResponse {
    pub fn empty(request: Option<&RequestHeader>) -> Self {
        Self {
            header: Some(ResponseHeader::success(request)),
            peers: Vec::new(),
            table_routes: Vec::new(),
        }
    }

    pub fn failed(request: Option<&RequestHeader>, err: &MetaError) -> Self {
        Self {
            header: Some(ResponseHeader::failed(request, err)),
            peers: Vec::new(),
            table_routes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty() && self.table_routes.is_empty()
    }

    /// Converts the status channel back into a `Result`.
    pub fn into_result(self) -> Result<Self> {
        match self.header.as_ref().and_then(|h| h.error.as_ref()) {
            Some(err) => Err(MetaError::from_status(err.code, err.err_msg.clone())),
            None => Ok(self),
        }
    }

    /// Route for `name`, if present.
    pub fn table_route(&self, name: &TableName) -> Option<&TableRoute> {
        self.table_routes
            .iter()
            .find(|route| route.table_name() == Some(name))
    }

    /// Resolves a peer index carried by one of this response's region routes.
    pub fn peer(&self, index: u64) -> Option<&Peer> {
        self.peers.get(index as usize)
    }
}
