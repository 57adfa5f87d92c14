//! ABOUTME: Builds the long-lived Engine: registers all eight executors,
//! ABOUTME: the rig LLM providers and the SQLite-backed memory/session stores

use crate::venv::ProcessVenvManager;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use graphflow_core::error::resource_error;
use graphflow_core::traits::storage::SessionStore;
use graphflow_core::Result;
use graphflow_providers::abstraction::{ProviderConfig, ProviderManager};
use graphflow_providers::rig::create_rig_provider;
use graphflow_storage::{spawn_sweeper, SqliteBackend, SqliteConfig, SqliteMemoryStore, SqliteSessionStore};
use graphflow_tools::tts::TtsProvider;
use graphflow_tools::{
    ApiResponseExecutor, BotReplyExecutor, ExecExecutor, HttpExecutor, LlmExecutor, PythonExecutor, SqlExecutor,
    TtsExecutor,
};
use graphflow_workflows::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;

/// Offline synthesis via `espeak-ng` (or `espeak`), whichever is on PATH.
/// Picked over a cloud provider as the CLI's default so `graphflow run`
/// works without API credentials; a hosted provider can be registered
/// alongside it once its config surface (key, region, ...) is decided.
struct EspeakProvider {
    binary: String,
}

impl EspeakProvider {
    fn discover() -> Option<Self> {
        for candidate in ["espeak-ng", "espeak"] {
            if which::which(candidate).is_ok() {
                return Some(Self { binary: candidate.to_string() });
            }
        }
        None
    }
}

#[async_trait]
impl TtsProvider for EspeakProvider {
    async fn synthesize(&self, text: &str, voice: Option<&str>, output_file: &str) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command.arg("-w").arg(output_file);
        if let Some(voice) = voice {
            command.arg("-v").arg(voice);
        }
        command.arg(text);
        let status = command
            .status()
            .await
            .map_err(|e| resource_error(format!("failed to spawn '{}': {e}", self.binary)))?;
        if !status.success() {
            return Err(resource_error(format!("'{}' exited with status {status}", self.binary)));
        }
        Ok(())
    }
}

fn graphflow_home() -> PathBuf {
    std::env::var_os("GRAPHFLOW_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let base = dirs_home();
            base.join(".graphflow")
        })
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

/// Builds the process-lifetime `Engine`: one memory store shared across
/// sessions, one SQLite-backed session store per session id, and every
/// executor the runtime ships registered against the fixed resource kinds.
pub async fn build_engine() -> Result<Engine> {
    let home = graphflow_home();
    tokio::fs::create_dir_all(&home)
        .await
        .map_err(|e| resource_error(format!("failed to create {}: {e}", home.display())))?;

    let db_path = std::env::var("GRAPHFLOW_MEMORY_DB_PATH").unwrap_or_else(|_| {
        home.join("memory.db").to_string_lossy().into_owned()
    });
    let backend = Arc::new(SqliteBackend::open(&SqliteConfig::new(db_path)).await?);
    let memory = Arc::new(SqliteMemoryStore::open(backend.clone()).await?);
    spawn_sweeper(backend.clone());

    let providers = Arc::new(ProviderManager::new());
    providers.register_provider("openai", create_rig_provider).await;
    providers.register_provider("anthropic", create_rig_provider).await;
    providers.register_provider("cohere", create_rig_provider).await;

    let venv_cache = home.join("venvs");
    let venv_manager: Arc<dyn graphflow_tools::VenvManager> = Arc::new(ProcessVenvManager::new(venv_cache));

    let audio_dir = home.join("audio");
    tokio::fs::create_dir_all(&audio_dir)
        .await
        .map_err(|e| resource_error(format!("failed to create {}: {e}", audio_dir.display())))?;
    let mut tts = TtsExecutor::new(audio_dir.to_string_lossy().into_owned());
    if let Some(espeak) = EspeakProvider::discover() {
        tts = tts.with_provider("espeak", Arc::new(espeak));
    }

    let session_backend = backend;
    let session_factory: graphflow_workflows::engine::SessionFactory = Arc::new(move |session_id: String| {
        let backend = session_backend.clone();
        Box::pin(async move {
            let store = SqliteSessionStore::open(backend, session_id, Some(ChronoDuration::hours(24))).await?;
            Ok(Arc::new(store) as Arc<dyn SessionStore>)
        })
    });

    let engine = Engine::builder()
        .with_executor(Arc::new(LlmExecutor::new(providers)))
        .with_executor(Arc::new(HttpExecutor::new()))
        .with_executor(Arc::new(SqlExecutor::new()))
        .with_executor(Arc::new(PythonExecutor::new(venv_manager)))
        .with_executor(Arc::new(ExecExecutor::new()))
        .with_executor(Arc::new(tts))
        .with_executor(Arc::new(BotReplyExecutor::new()))
        .with_executor(Arc::new(ApiResponseExecutor::new()))
        .with_memory(memory)
        .with_session_factory(session_factory)
        .with_fs_root(std::env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_else(|_| ".".to_string()))
        .build();

    Ok(engine)
}

/// Builds a provider instance eagerly from env vars (`GRAPHFLOW_OPENAI_*`
/// etc.) when the workflow's default backend/model is known up front -
/// otherwise `ProviderManager::ensure_model` initialises it lazily on the
/// first LLM resource that asks for it.
#[allow(dead_code)]
async fn eager_init(providers: &ProviderManager, backend: &str, model: &str) -> Result<()> {
    let mut config = ProviderConfig::from_env(backend)?;
    config.model = model.to_string();
    providers.init_provider(config).await
}
