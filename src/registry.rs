use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use crate::error::LLMError;
use crate::provider::DynProvider;

/// Name-keyed provider table.
///
/// Providers are registered once at startup; lookups may then run concurrently.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<BTreeMap<&'static str, DynProvider>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers each provider under its [`name`](crate::provider::Provider::name).
    ///
    /// The batch is checked as a whole, so a rejected batch registers nothing.
    ///
    /// # Panics
    ///
    /// Panics when a name is already taken, either by an earlier registration or twice
    /// within the batch.
    pub fn register(&self, providers: impl IntoIterator<Item = DynProvider>) {
        let providers: Vec<DynProvider> = providers.into_iter().collect();
        let mut table = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut batch = BTreeSet::new();
        let duplicate = providers
            .iter()
            .map(|provider| provider.name())
            .find(|name| table.contains_key(name) || !batch.insert(*name));
        if let Some(name) = duplicate {
            drop(table);
            panic!("provider already registered: {name}");
        }

        for provider in providers {
            table.insert(provider.name(), provider);
        }
    }

    /// Returns the provider registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<DynProvider> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Every `provider/model` pair, providers sorted, models in declared order.
    pub fn qualified_models(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|(name, provider)| {
                provider
                    .supported_models()
                    .iter()
                    .map(move |model| format!("{name}/{model}"))
            })
            .collect()
    }

    /// Resolves a `provider/model` identifier to a registered provider and model name.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when the identifier has no `/`, names an unknown
    /// provider, or names a model the provider does not list.
    pub fn resolve(&self, qualified: &str) -> Result<(DynProvider, String), LLMError> {
        let Some((name, model)) = qualified.split_once('/') else {
            return Err(LLMError::validation(
                "invalid model format\n\nUse: provider/model (e.g., openai/gpt-4o)",
            ));
        };
        let provider = self.lookup(name).ok_or_else(|| {
            LLMError::validation(format!(
                "unknown provider: {name}\n\nSee available: q models list"
            ))
        })?;
        if !provider.supports_model(model) {
            return Err(LLMError::validation(format!(
                "unsupported model '{model}' for {name}\n\nSee available: q models list"
            )));
        }
        Ok((provider, model.to_string()))
    }
}
