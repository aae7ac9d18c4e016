//! Feature flag gate.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;

use flowgate_core::error::{Abort, UnitError};
use flowgate_core::{Category, Descriptor, PolicyUnit, RequestContext};

use super::{feature_fn, FeatureChecker};

/// Context store key read when no checker callback is configured.
pub const FEATURES_KEY: &str = "features";

/// Flag map an earlier unit or hook may place under [`FEATURES_KEY`].
pub type FeatureFlags = HashMap<String, bool>;

/// Aborts with `FeatureDisabled` unless `feature` is on.
pub struct FeatureEnabled {
    feature: String,
    checker: Option<FeatureChecker>,
}

impl FeatureEnabled {
    /// Look the flag up in the context's [`FeatureFlags`].
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            checker: None,
        }
    }

    pub fn with_checker<F, Fut>(self, checker: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, UnitError>> + Send + 'static,
    {
        self.with_shared_checker(feature_fn(checker))
    }

    pub fn with_shared_checker(mut self, checker: FeatureChecker) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }
}

#[async_trait]
impl PolicyUnit for FeatureEnabled {
    fn category(&self) -> Category {
        Category::Feature
    }

    fn name(&self) -> &str {
        "FeatureEnabled"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let enabled = match &self.checker {
            Some(checker) => checker(self.feature.clone()).await?,
            None => ctx
                .get::<FeatureFlags>(FEATURES_KEY)
                .and_then(|flags| flags.get(&self.feature))
                .copied()
                .unwrap_or(false),
        };
        if !enabled {
            return Err(Abort::feature_disabled().into());
        }
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        Some(Descriptor::new().with_response_description(403, "Feature disabled"))
    }
}
