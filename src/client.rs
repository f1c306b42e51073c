// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Application composition root
//!
//! Builds the completion orchestrator and the realtime session from
//! settings and hands them to whatever UI sits on top. Nothing here is
//! global: create one `ChatClient`, use it, then `shutdown()` it.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{CompletionError, Result};
use crate::llm::backend::CompletionBackend;
use crate::llm::message::{CompletionResult, HistoryTurn};
use crate::llm::orchestrator::CompletionOrchestrator;
use crate::pricing::PriceTable;
use crate::realtime::{Connector, SessionManager, WsConnector};

pub struct ChatClient {
    settings: Settings,
    completions: CompletionOrchestrator,
    session: SessionManager,
}

impl ChatClient {
    /// Validate settings and wire the HTTP backend and websocket connector.
    pub fn init(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let completions = CompletionOrchestrator::from_settings(&settings)?;
        let connector = WsConnector::new(std::time::Duration::from_millis(
            settings.realtime.connect_timeout_ms,
        ));
        Ok(Self::assemble(settings, completions, Arc::new(connector)))
    }

    /// Wire caller-provided transports; used by tests and embedders.
    pub fn with_parts(
        settings: Settings,
        backend: Arc<dyn CompletionBackend>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        settings.validate()?;
        let completions =
            CompletionOrchestrator::new(backend, &settings.completion, settings.models.clone())
                .with_cost_estimator(Arc::new(PriceTable::new(settings.pricing.clone())));
        Ok(Self::assemble(settings, completions, connector))
    }

    fn assemble(
        settings: Settings,
        completions: CompletionOrchestrator,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let session = SessionManager::new(
            settings.realtime.clone(),
            settings.get_auth_token(),
            connector,
        );
        tracing::info!(
            api = %settings.api.base_url,
            ws = %settings.realtime.ws_url,
            "chat client initialised"
        );
        Self {
            settings,
            completions,
            session,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn completions(&self) -> &CompletionOrchestrator {
        &self.completions
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// One-shot completion through the shared orchestrator.
    pub async fn ask(
        &self,
        text: &str,
        model: &str,
        history: &[HistoryTurn],
    ) -> std::result::Result<CompletionResult, CompletionError> {
        self.completions.complete(text, model, history).await
    }

    /// Tear down the session and drop cached completions.
    pub async fn shutdown(self) {
        self.session.shutdown().await;
        self.completions.clear_cache();
        tracing::info!("chat client shut down");
    }
}
