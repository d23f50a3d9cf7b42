//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of per-user sessions.

use crate::{adapters::OpenAiStudyAdapter, config::Config};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::{collections::HashMap, sync::Arc};
use study_kit_core::{LanguageModelService, SessionContext, StudyService};
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub study: Arc<StudyService>,
    pub llm: LlmProvider,
    pub sessions: SessionStore,
}

//=========================================================================================
// LLM Resolution
//=========================================================================================

/// Decides which LLM client serves a request: the key configured at startup wins,
/// otherwise the key the user entered (sent as the `x-api-key` header).
#[derive(Clone)]
pub struct LlmProvider {
    configured: Option<Arc<dyn LanguageModelService>>,
    api_base: String,
    model: String,
}

impl LlmProvider {
    pub fn new(configured: Option<Arc<dyn LanguageModelService>>, api_base: &str, model: &str) -> Self {
        Self {
            configured,
            api_base: api_base.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let configured = config.llm_api_key.as_ref().map(|key| {
            Arc::new(OpenAiStudyAdapter::with_key(key, &config.llm_api_base, &config.llm_model))
                as Arc<dyn LanguageModelService>
        });
        Self::new(configured, &config.llm_api_base, &config.llm_model)
    }

    pub fn has_configured_key(&self) -> bool {
        self.configured.is_some()
    }

    /// `None` means no key is available anywhere.
    pub fn resolve(&self, entered_key: Option<&str>) -> Option<Arc<dyn LanguageModelService>> {
        if let Some(llm) = &self.configured {
            return Some(llm.clone());
        }
        let key = entered_key.map(str::trim).filter(|key| !key.is_empty())?;
        let adapter = OpenAiStudyAdapter::with_key(
            &SecretString::from(key.to_string()),
            &self.api_base,
            &self.model,
        );
        Some(Arc::new(adapter))
    }
}

//=========================================================================================
// SessionStore (One Entry per User Session)
//=========================================================================================

pub type SharedSession = Arc<Mutex<SessionContext>>;

/// Sessions keyed by id. Each session has its own lock, so actions within one
/// session are serialized while different sessions never contend.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub async fn create(&self) -> Uuid {
        let session = SessionContext::new();
        let id = session.id;
        self.inner
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops sessions idle for longer than `idle_for`. Sessions busy with a
    /// request are skipped.
    pub async fn expire_idle(&self, idle_for: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(context) => !context.is_idle(idle_for, now),
            Err(_) => true,
        });
        let expired = before - sessions.len();
        if expired > 0 {
            info!("Expired {} idle sessions", expired);
        }
        expired
    }
}
