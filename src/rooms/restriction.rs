//! Restriction hooks: policy code narrowing room queries.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::{Document, doc};

/// Contributes extra criteria to every room query.
#[async_trait]
pub trait RoomRestriction: Send + Sync {
    /// Extend `query` (the output of the previous hook) and return it.
    async fn restrict(&self, query: Document) -> Result<Document>;
}

/// Ordered list of restriction hooks.
#[derive(Clone, Default)]
pub struct RestrictionHooks {
    hooks: Vec<Arc<dyn RoomRestriction>>,
}

impl RestrictionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, hook: impl RoomRestriction + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in order, each one receiving the previous result.
    pub async fn apply(&self) -> Result<Document> {
        let mut query = Document::new();
        for hook in &self.hooks {
            query = hook.restrict(query).await?;
        }
        Ok(query)
    }
}

impl std::fmt::Debug for RestrictionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestrictionHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Limits rooms to a fixed set of departments.
#[derive(Debug, Clone)]
pub struct DepartmentScope {
    department_ids: Vec<String>,
}

impl DepartmentScope {
    pub fn new(department_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            department_ids: department_ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RoomRestriction for DepartmentScope {
    async fn restrict(&self, mut query: Document) -> Result<Document> {
        query.insert("departmentId", doc! { "$in": self.department_ids.clone() });
        Ok(query)
    }
}
