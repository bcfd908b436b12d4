// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker-backed container runner.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anvil_protocol::WorkflowAction;
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{ContainerRunner, RunHandle, RunnerError};

pub struct DockerRunner {
    docker: Docker,
    /// Registry prefix to base64 auth token, longest prefix wins.
    registry_auth: HashMap<String, String>,
    /// Host directory mounted into each container at `/workflow`.
    data_dir: PathBuf,
}

impl DockerRunner {
    /// Connect to the local Docker daemon.
    pub fn new(
        registry_auth: HashMap<String, String>,
        data_dir: PathBuf,
    ) -> Result<Self, RunnerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RunnerError::Runtime(e.to_string()))?;
        Ok(Self {
            docker,
            registry_auth,
            data_dir,
        })
    }

    fn credentials_for(&self, image: &str) -> Option<DockerCredentials> {
        self.registry_auth
            .iter()
            .filter(|(registry, _)| image.starts_with(registry.as_str()))
            .max_by_key(|(registry, _)| registry.len())
            .map(|(_, token)| DockerCredentials {
                auth: Some(token.clone()),
                ..DockerCredentials::default()
            })
    }

    async fn pull_image(&self, image: &str) -> Result<(), RunnerError> {
        debug!(image, "pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..CreateImageOptions::default()
        };
        let mut pull = self
            .docker
            .create_image(Some(options), None, self.credentials_for(image));
        while let Some(progress) = pull.next().await {
            let info = progress.map_err(|e| RunnerError::Prepare(e.to_string()))?;
            if let Some(error) = info.error {
                return Err(RunnerError::Prepare(error));
            }
        }
        Ok(())
    }

    /// Container config built from the rendered action. Binds merge the
    /// per-workflow scratch mount with the action volumes; later entries
    /// win on a target conflict.
    fn container_config(&self, workflow_id: &str, action: &WorkflowAction) -> Config<String> {
        let a = &action.action;

        let env: Vec<String> = a.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

        let mut cmd: Vec<String> = Vec::new();
        if let Some(c) = &a.cmd {
            cmd.push(c.clone());
        }
        cmd.extend(a.args.iter().cloned());

        let scratch = format!(
            "{}/{}:/workflow",
            self.data_dir.display(),
            workflow_id
        );
        let binds = merge_binds(scratch, &a.volumes);

        let host_config = HostConfig {
            privileged: Some(true),
            binds: Some(binds),
            network_mode: a.namespace.as_ref().and_then(|n| n.network.clone()),
            pid_mode: a.namespace.as_ref().and_then(|n| n.pid.clone()),
            ..HostConfig::default()
        };

        Config {
            image: Some(a.image.clone()),
            env: Some(env),
            cmd: if cmd.is_empty() { None } else { Some(cmd) },
            tty: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Config::default()
        }
    }
}

/// Merge volume binds by target directory; later entries override earlier
/// ones so action-level mounts win over workflow-level ones.
fn merge_binds(scratch: String, volumes: &[String]) -> Vec<String> {
    let mut binds: Vec<String> = vec![scratch];
    for volume in volumes {
        let target = bind_target(volume);
        if let Some(existing) = binds.iter().position(|b| bind_target(b) == target) {
            binds.remove(existing);
        }
        binds.push(volume.clone());
    }
    binds
}

/// The TGT-CONTAINER-DIR of a `SRC:TGT[:OPTIONS]` bind.
fn bind_target(bind: &str) -> &str {
    let mut parts = bind.splitn(3, ':');
    let _src = parts.next();
    parts.next().unwrap_or(bind)
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn prepare(
        &self,
        workflow_id: &str,
        action: &WorkflowAction,
    ) -> Result<String, RunnerError> {
        self.pull_image(&action.action.image).await?;

        let name = format!(
            "{}-{}",
            action.action.name.replace(' ', "-"),
            action.id
        );
        let options = CreateContainerOptions {
            name,
            platform: None,
        };
        let created = self
            .docker
            .create_container(Some(options), self.container_config(workflow_id, action))
            .await
            .map_err(|e| RunnerError::Prepare(e.to_string()))?;
        debug!(container = %created.id, action = %action.action.name, "created container");
        Ok(created.id)
    }

    async fn run(&self, id: &str, logs: mpsc::Sender<Vec<u8>>) -> Result<RunHandle, RunnerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RunnerError::Start(e.to_string()))?;

        // Log drain: forward each output chunk as it appears.
        let mut log_stream = self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..LogsOptions::default()
            }),
        );
        tokio::spawn(async move {
            while let Some(chunk) = log_stream.next().await {
                match chunk {
                    Ok(output) => {
                        if logs.send(output.into_bytes().to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "log stream ended");
                        break;
                    }
                }
            }
        });

        let mut wait = self
            .docker
            .wait_container(id, Some(WaitContainerOptions {
                condition: "not-running",
            }));
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = match wait.next().await {
                Some(Ok(response)) if response.status_code == 0 => Ok(()),
                Some(Ok(response)) => Err(RunnerError::ExitCode(response.status_code)),
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                    Err(RunnerError::ExitCode(code))
                }
                Some(Err(e)) => Err(RunnerError::Runtime(e.to_string())),
                None => Err(RunnerError::Runtime("container wait stream ended".to_string())),
            };
            let _ = tx.send(result);
        });

        Ok(RunHandle::new(rx))
    }

    async fn destroy(&self, id: &str, grace: Duration) -> Result<(), RunnerError> {
        // Bounded independently of the caller's context so a cancelled
        // worker still cleans up its container.
        let stop_then_remove = async {
            // Stopping before removing lets final log lines land.
            if let Err(e) = self
                .docker
                .stop_container(id, Some(StopContainerOptions {
                    t: grace.as_secs() as i64,
                }))
                .await
            {
                debug!(container = id, error = %e, "stop before remove failed");
            }
            self.docker
                .remove_container(
                    id,
                    Some(RemoveContainerOptions {
                        force: true,
                        v: true,
                        ..RemoveContainerOptions::default()
                    }),
                )
                .await
                .map_err(|e| RunnerError::Runtime(e.to_string()))
        };

        match tokio::time::timeout(grace + Duration::from_secs(5), stop_then_remove).await {
            Ok(result) => result,
            Err(_) => {
                warn!(container = id, "destroy timed out");
                Err(RunnerError::Runtime("destroy timed out".to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
