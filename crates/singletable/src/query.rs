//! Immutable query objects.
//!
//! Every chaining method returns a new [`Query`]; none of them touch the
//! engine. I/O happens only in [`Query::execute`], [`Query::all`] and
//! [`Query::count`].

use std::fmt;

use serde_json::{Map, Value};
use tracing::trace;

use singletable_core::codec::decode;
use singletable_core::condition::{compile_filter, compile_key_condition, Filter, SortKeyFilter};
use singletable_core::schema::{Entity, IndexId};
use singletable_core::storage::{Item, QueryRequest, Result, StorageError};
use singletable_core::Cursor;

use crate::table::Table;

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Resumes the query after this page; `None` when nothing is left.
    pub cursor: Option<Cursor>,
}

/// A query against one partition of the primary key or of an index.
pub struct Query<T> {
    table: Table<T>,
    index: Option<IndexId>,
    partition: Map<String, Value>,
    sort_key: SortKeyFilter,
    filter: Filter,
    limit: Option<u32>,
    cursor: Option<Cursor>,
    reverse: bool,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            index: self.index,
            partition: self.partition.clone(),
            sort_key: self.sort_key.clone(),
            filter: self.filter.clone(),
            limit: self.limit,
            cursor: self.cursor.clone(),
            reverse: self.reverse,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("index", &self.index)
            .field("partition", &self.partition)
            .field("sort_key", &self.sort_key)
            .field("filter", &self.filter)
            .field("limit", &self.limit)
            .field("cursor", &self.cursor)
            .field("reverse", &self.reverse)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> Query<T> {
    pub(crate) fn new(
        table: Table<T>,
        index: Option<IndexId>,
        partition: Map<String, Value>,
    ) -> Self {
        Self {
            table,
            index,
            partition,
            sort_key: SortKeyFilter::default(),
            filter: Filter::default(),
            limit: None,
            cursor: None,
            reverse: false,
        }
    }

    /// Restricts the sort key.
    pub fn sort_key(&self, sort_key: SortKeyFilter) -> Self {
        Self {
            sort_key,
            ..self.clone()
        }
    }

    /// Caps the number of items the engine evaluates per page.
    ///
    /// The cap applies before the post-filter, so a page may hold fewer
    /// items and still carry a cursor. A limit of zero fails to compile.
    pub fn limit(&self, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    /// Resumes after the page that returned `cursor`.
    pub fn cursor(&self, cursor: impl Into<Option<Cursor>>) -> Self {
        Self {
            cursor: cursor.into(),
            ..self.clone()
        }
    }

    /// Returns items in descending sort-key order.
    pub fn reverse(&self) -> Self {
        Self {
            reverse: true,
            ..self.clone()
        }
    }

    /// Post-filter evaluated by the engine after the key condition.
    pub fn filter(&self, filter: Filter) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }

    /// Compiles the query without running it.
    pub fn compile(&self) -> Result<QueryRequest> {
        let schema = self.table.schema();
        let index = match self.index {
            Some(id) => Some(
                schema
                    .indexes()
                    .find(|index| index.id == id)
                    .ok_or_else(|| StorageError::UnknownIndex(id.to_string()))?,
            ),
            None => None,
        };
        if self.limit == Some(0) {
            return Err(StorageError::InvalidFilter(
                "limit must be at least 1".to_string(),
            ));
        }

        Ok(QueryRequest {
            table_name: self.table.client().table_name().to_string(),
            index: self.index,
            key_condition: compile_key_condition(schema, index, &self.partition, &self.sort_key)?,
            filter: compile_filter(&self.filter),
            limit: self.limit,
            start_key: self.cursor.as_ref().map(Cursor::decode).transpose()?,
            scan_forward: !self.reverse,
        })
    }

    /// Runs one page.
    pub async fn execute(&self) -> Result<Page<T>> {
        let request = self.compile()?;
        let page = self.table.client().engine().query(&request).await?;
        trace!(
            table = %request.table_name,
            condition = %request.key_condition,
            items = page.items.len(),
            more = page.last_key.is_some(),
            "Query page"
        );

        Ok(Page {
            items: self.decode_all(page.items)?,
            cursor: page.last_key.as_ref().map(Cursor::encode).transpose()?,
        })
    }

    /// Runs page after page until the engine reports no more results.
    pub async fn all(&self) -> Result<Vec<T>> {
        let request = self.compile()?;
        let engine = self.table.client().engine();
        let mut items = Vec::new();
        let mut start_key = request.start_key.clone();
        let mut pages = 0usize;

        loop {
            let page = engine.query(&request.resume_from(start_key)).await?;
            pages += 1;
            items.extend(self.decode_all(page.items)?);
            match page.last_key {
                Some(last_key) => start_key = Some(last_key),
                None => break,
            }
        }

        trace!(
            table = %request.table_name,
            condition = %request.key_condition,
            items = items.len(),
            pages,
            "Query all"
        );
        Ok(items)
    }

    /// Counts matching items across every page.
    pub async fn count(&self) -> Result<usize> {
        let request = self.compile()?;
        let engine = self.table.client().engine();
        let mut total = 0;
        let mut start_key = request.start_key.clone();

        loop {
            let page = engine.count(&request.resume_from(start_key)).await?;
            total += page.count;
            match page.last_key {
                Some(last_key) => start_key = Some(last_key),
                None => break,
            }
        }

        trace!(
            table = %request.table_name,
            condition = %request.key_condition,
            total,
            "Query count"
        );
        Ok(total)
    }

    fn decode_all(&self, items: Vec<Item>) -> Result<Vec<T>> {
        items
            .into_iter()
            .map(|item| decode(self.table.schema(), item))
            .collect()
    }
}
