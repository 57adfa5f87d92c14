//! ABOUTME: Process-backed VenvManager - shells out to `python -m venv`
//! ABOUTME: and pip to materialise the interpreter a Python resource asks for

use async_trait::async_trait;
use graphflow_core::error::resource_error;
use graphflow_core::Result;
use std::path::PathBuf;
use tokio::process::Command;

/// Caches one venv per (python_version, venv_name) pair under `cache_dir`.
/// `venv_name` defaults to the python version itself so two resources that
/// both ask for the same interpreter and no extra packages share a venv.
pub struct ProcessVenvManager {
    cache_dir: PathBuf,
}

impl ProcessVenvManager {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn interpreter_for(&self, python_version: &str) -> String {
        if python_version == "3" || python_version.is_empty() {
            "python3".to_string()
        } else {
            format!("python{python_version}")
        }
    }
}

#[async_trait]
impl graphflow_tools::VenvManager for ProcessVenvManager {
    async fn ensure_venv(
        &self,
        python_version: &str,
        packages: &[String],
        requirements_file: Option<&str>,
        venv_name: Option<&str>,
    ) -> Result<String> {
        let name = venv_name.unwrap_or(python_version);
        let venv_path = self.cache_dir.join(name);

        if !venv_path.join("pyvenv.cfg").exists() {
            tokio::fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(|e| resource_error(format!("failed to create venv cache dir: {e}")))?;
            let interpreter = self.interpreter_for(python_version);
            let status = Command::new(&interpreter)
                .args(["-m", "venv", &venv_path.to_string_lossy()])
                .status()
                .await
                .map_err(|e| resource_error(format!("failed to spawn '{interpreter}' to create venv: {e}")))?;
            if !status.success() {
                return Err(resource_error(format!(
                    "'{interpreter} -m venv' exited with status {status}"
                )));
            }
        }

        let pip = venv_path.join("bin").join("pip");
        if !packages.is_empty() {
            let status = Command::new(&pip)
                .arg("install")
                .args(packages)
                .status()
                .await
                .map_err(|e| resource_error(format!("failed to spawn pip install: {e}")))?;
            if !status.success() {
                return Err(resource_error(format!("pip install exited with status {status}")));
            }
        }
        if let Some(requirements) = requirements_file {
            let status = Command::new(&pip)
                .args(["install", "-r", requirements])
                .status()
                .await
                .map_err(|e| resource_error(format!("failed to spawn pip install -r: {e}")))?;
            if !status.success() {
                return Err(resource_error(format!(
                    "pip install -r '{requirements}' exited with status {status}"
                )));
            }
        }

        Ok(venv_path.to_string_lossy().into_owned())
    }

    async fn python_path(&self, venv_path: &str) -> Result<String> {
        Ok(PathBuf::from(venv_path)
            .join("bin")
            .join("python")
            .to_string_lossy()
            .into_owned())
    }
}
