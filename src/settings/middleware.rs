//! Middleware chain around registry mutations.
//!
//! A `Chain` is composed once, when the registry is built, from an ordered
//! list of `Middleware` and the base `Operation`. Middleware run in
//! registration order: the first registered sees the call first and the
//! result last.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::{Result, SettingsError};
use super::{GroupOptions, GroupOutcome, Setting, SettingOptions, SettingValue};

/// Arguments of `SettingsRegistry::add`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddSetting {
    pub key: String,
    pub default: SettingValue,
    pub options: SettingOptions,
}

/// Arguments of `SettingsRegistry::add_group`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddGroup {
    pub name: String,
    pub options: GroupOptions,
}

/// The operation at the end of a chain.
#[async_trait]
pub trait Operation<C, T>: Send + Sync {
    async fn call(&self, call: C) -> Result<T>;
}

/// An interceptor around an `Operation`.
///
/// Implementations may rewrite `call` before passing it on, return without
/// calling `next`, or post-process what `next` returns.
#[async_trait]
pub trait Middleware<C, T>: Send + Sync {
    async fn handle(&self, call: C, next: Next<'_, C, T>) -> Result<T>;
}

/// Continuation handed to each middleware: the rest of the chain.
pub struct Next<'a, C, T> {
    middleware: &'a [Arc<dyn Middleware<C, T>>],
    operation: &'a dyn Operation<C, T>,
}

impl<'a, C, T> Next<'a, C, T>
where
    C: Send + 'static,
    T: Send + 'static,
{
    /// Run the remaining middleware and the base operation.
    pub async fn run(self, call: C) -> Result<T> {
        match self.middleware.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    middleware: rest,
                    operation: self.operation,
                };
                head.handle(call, next).await
            }
            None => self.operation.call(call).await,
        }
    }
}

/// A base operation composed with its middleware.
pub struct Chain<C, T> {
    middleware: Vec<Arc<dyn Middleware<C, T>>>,
    operation: Arc<dyn Operation<C, T>>,
}

impl<C, T> Chain<C, T>
where
    C: Send + 'static,
    T: Send + 'static,
{
    pub fn new(operation: Arc<dyn Operation<C, T>>, middleware: Vec<Arc<dyn Middleware<C, T>>>) -> Self {
        Self { middleware, operation }
    }

    pub async fn call(&self, call: C) -> Result<T> {
        Next {
            middleware: &self.middleware,
            operation: self.operation.as_ref(),
        }
        .run(call)
        .await
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

/// Logs every registration call with its outcome and duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLog;

#[async_trait]
impl Middleware<AddSetting, Setting> for AuditLog {
    async fn handle(&self, call: AddSetting, next: Next<'_, AddSetting, Setting>) -> Result<Setting> {
        let key = call.key.clone();
        let started = Instant::now();
        let result = next.run(call).await;
        match &result {
            Ok(setting) => debug!(
                "Registered setting {} = {} ({:?})",
                key,
                setting.value,
                started.elapsed()
            ),
            Err(e) => warn!("Registering setting {} failed: {}", key, e),
        }
        result
    }
}

#[async_trait]
impl Middleware<AddGroup, GroupOutcome> for AuditLog {
    async fn handle(&self, call: AddGroup, next: Next<'_, AddGroup, GroupOutcome>) -> Result<GroupOutcome> {
        let name = call.name.clone();
        let result = next.run(call).await;
        match &result {
            Ok(outcome) => debug!("Group {}: {:?}", name, outcome),
            Err(e) => warn!("Registering group {} failed: {}", name, e),
        }
        result
    }
}

/// Rejects keys and group names outside `[A-Za-z0-9_.-]+`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFormat;

impl KeyFormat {
    fn check(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(SettingsError::validation(key, "key must not be empty"));
        }
        if let Some(bad) = key
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(SettingsError::validation(key, format!("character {bad:?} is not allowed in keys")));
        }
        Ok(())
    }
}

#[async_trait]
impl Middleware<AddSetting, Setting> for KeyFormat {
    async fn handle(&self, call: AddSetting, next: Next<'_, AddSetting, Setting>) -> Result<Setting> {
        Self::check(&call.key)?;
        next.run(call).await
    }
}

#[async_trait]
impl Middleware<AddGroup, GroupOutcome> for KeyFormat {
    async fn handle(&self, call: AddGroup, next: Next<'_, AddGroup, GroupOutcome>) -> Result<GroupOutcome> {
        Self::check(&call.name)?;
        next.run(call).await
    }
}
