// ABOUTME: Shared server resources built once at startup and handed to every route
// ABOUTME: Holds configuration, the session orchestrator, accounts, the food analyzer, and the token verifier
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tracing::info;

use crate::auth::{AccountService, FirebaseTokenVerifier, TokenVerifier};
use crate::config::ServerConfig;
use crate::documents::{self, DocumentStore};
use crate::errors::{AppError, AppResult};
use crate::llm::{LlmProvider, OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use crate::mentor::{
    ConversationStore, InMemoryConversationStore, ModelSettings, ProfileLoader, PromptComposer,
    SessionOrchestrator,
};
use crate::nutrition::FoodAnalyzer;

/// Everything route handlers need, shared behind one `Arc`
pub struct ServerResources {
    /// Validated configuration
    pub config: Arc<ServerConfig>,
    /// Chat turn orchestration
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Sign-up and sign-in bookkeeping
    pub accounts: Arc<AccountService>,
    /// Food image analysis
    pub analyzer: Arc<FoodAnalyzer>,
    /// Token verifier, present when `AUTH_ENABLED` is set
    pub verifier: Option<Arc<dyn TokenVerifier>>,
}

impl ServerResources {
    /// Assemble resources from already built components
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        documents: Arc<dyn DocumentStore>,
        conversations: Arc<dyn ConversationStore>,
        provider: Arc<dyn LlmProvider>,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Self {
        let accounts = AccountService::new(Arc::clone(&documents));
        let orchestrator = SessionOrchestrator::new(
            ProfileLoader::new(documents),
            PromptComposer::new(config.safety_directives),
            conversations,
            Arc::clone(&provider),
            ModelSettings::from_llm_config(&config.llm),
        );
        let analyzer = FoodAnalyzer::from_llm_config(provider, &config.llm);

        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            accounts: Arc::new(accounts),
            analyzer: Arc::new(analyzer),
            verifier,
        }
    }

    /// Build every component described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the document store, the model client, or the
    /// token verifier cannot be created.
    pub fn from_config(config: ServerConfig) -> AppResult<Self> {
        let documents = documents::from_config(&config)?;

        let provider_config =
            OpenAiCompatibleConfig::from_llm_config(&config.llm, &config.llm.chat_model);
        let provider: Arc<dyn LlmProvider> =
            Arc::new(OpenAiCompatibleProvider::new(provider_config)?);
        info!(
            provider = provider.name(),
            chat_model = %config.llm.chat_model,
            vision_model = %config.llm.vision_model,
            "Model backend configured"
        );

        let verifier: Option<Arc<dyn TokenVerifier>> = if config.firebase.auth_enabled {
            let project_id = config.firebase.project_id.clone().ok_or_else(|| {
                AppError::config("AUTH_ENABLED requires FIREBASE_PROJECT_ID")
            })?;
            info!(project_id = %project_id, "Firebase ID token verification enabled");
            Some(Arc::new(FirebaseTokenVerifier::new(project_id)))
        } else {
            None
        };

        Ok(Self::new(
            Arc::new(config),
            documents,
            Arc::new(InMemoryConversationStore::new()),
            provider,
            verifier,
        ))
    }
}
