//! Helm CLI argument builder, grounded directly on
//! `operators/src/upgrade/helm/client.rs` `HelmArgs`, generalized from a
//! single hard-coded chart to the full install/upgrade/uninstall/get/
//! rollback/render operation table.

use std::{
    ffi::OsStr,
    path::PathBuf,
    process::{Command, Output},
    time::Duration,
};

use crate::error::Error;

#[derive(Debug, Clone, Default)]
pub(crate) struct HelmArgs {
    pub(crate) name: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) chart_ref: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) values_file: Option<PathBuf>,
    pub(crate) wait: bool,
    pub(crate) atomic: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) reuse_values: bool,
    pub(crate) cleanup_on_fail: bool,
    pub(crate) max_history: Option<u32>,
}

impl HelmArgs {
    fn apply_common(&self, command: &mut Command) {
        if let Some(namespace) = &self.namespace {
            command.arg("--namespace").arg(namespace);
        }
        if let Some(values_file) = &self.values_file {
            command.arg("--values").arg(values_file);
        }
        if self.wait {
            command.arg("--wait");
        }
        if self.atomic {
            command.arg("--atomic");
        }
        if let Some(timeout) = self.timeout {
            command
                .arg("--timeout")
                .arg(format!("{}s", timeout.as_secs()));
        }
    }

    pub(crate) fn install(self) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.arg("install");
        command.arg(self.name.as_deref().unwrap_or_default());
        command.arg(self.chart_ref.as_deref().unwrap_or_default());
        if let Some(version) = &self.version {
            command.arg("--version").arg(version);
        }
        self.apply_common(&mut command);
        command.arg("--output=json");
        run(command)
    }

    pub(crate) fn upgrade(self) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.arg("upgrade");
        command.arg(self.name.as_deref().unwrap_or_default());
        command.arg(self.chart_ref.as_deref().unwrap_or_default());
        if let Some(version) = &self.version {
            command.arg("--version").arg(version);
        }
        if self.reuse_values {
            command.arg("--reuse-values");
        }
        if self.cleanup_on_fail {
            command.arg("--cleanup-on-fail");
        }
        if let Some(max_history) = self.max_history {
            command.arg("--history-max").arg(max_history.to_string());
        }
        self.apply_common(&mut command);
        command.arg("--output=json");
        run(command)
    }

    pub(crate) fn uninstall(self) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.arg("uninstall");
        command.arg(self.name.as_deref().unwrap_or_default());
        if let Some(namespace) = &self.namespace {
            command.arg("--namespace").arg(namespace);
        }
        run(command)
    }

    pub(crate) fn rollback(self, revision: u32) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.arg("rollback");
        command.arg(self.name.as_deref().unwrap_or_default());
        command.arg(revision.to_string());
        if let Some(namespace) = &self.namespace {
            command.arg("--namespace").arg(namespace);
        }
        if self.wait {
            command.arg("--wait");
        }
        run(command)
    }

    pub(crate) fn template(self) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.arg("template");
        command.arg(self.name.as_deref().unwrap_or_default());
        command.arg(self.chart_ref.as_deref().unwrap_or_default());
        if let Some(version) = &self.version {
            command.arg("--version").arg(version);
        }
        self.apply_common(&mut command);
        run(command)
    }

    pub(crate) fn ls(self, exact_match: &str) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.args(["list", "--filter", exact_match, "--output=json"]);
        if let Some(namespace) = &self.namespace {
            command.arg("--namespace").arg(namespace);
        }
        run(command)
    }

    pub(crate) fn get_values(self) -> Result<Output, Error> {
        let mut command = Command::new("helm");
        command.arg("get").arg("values");
        command.arg(self.name.as_deref().unwrap_or_default());
        command.arg("--output=json");
        if let Some(namespace) = &self.namespace {
            command.arg("--namespace").arg(namespace);
        }
        run(command)
    }

    pub(crate) fn version() -> Result<Output, Error> {
        run(helm_with(["version", "--short"]))
    }
}

fn helm_with<I, S>(args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new("helm");
    command.args(args);
    command
}

fn run(mut command: Command) -> Result<Output, Error> {
    let output = command
        .output()
        .map_err(|source| Error::HelmCommandNotExecutable { source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(Error::HelmCommandFailed { stderr });
    }
    Ok(output)
}
