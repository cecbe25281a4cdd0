// src/host.rs

//! Host activation interface
//!
//! The host is the long-running process that executes plugins. We only
//! need two calls from it: start a plugin by path, and list what is
//! running. [`CliHost`] drives the host's control CLI
//! (`<command> plugin start <path>` / `<command> plugin list`).

use crate::config::HostConfig;
use crate::error::{Error, Result};
use crate::process::CommandRunner;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

fn default_active() -> bool {
    true
}

/// One extension the host reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveExtension {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ActiveExtension {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: true,
        }
    }

    /// Final path component of the reported name
    pub fn basename(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
struct PluginsReply {
    #[serde(default)]
    plugins: Vec<ActiveExtension>,
}

/// Control surface of the host process
pub trait Host {
    /// Ask the host to start the plugin at `path` (absolute)
    fn start(&self, path: &Path) -> Result<Vec<ActiveExtension>>;

    /// Extensions the host currently runs
    fn active(&self) -> Result<Vec<ActiveExtension>>;
}

/// [`Host`] reached through its command-line client
pub struct CliHost<'a> {
    runner: &'a dyn CommandRunner,
    command: Vec<String>,
}

impl<'a> CliHost<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &HostConfig) -> Self {
        Self {
            runner,
            command: config.command.clone(),
        }
    }

    fn call(&self, args: &[&str]) -> Result<Vec<ActiveExtension>> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(Error::Config("host.command must name a program".to_string()));
        };
        let mut full: Vec<&str> = leading.iter().map(String::as_str).collect();
        full.extend_from_slice(args);

        let output = self.runner.run(program, &full, None).map_err(|e| match e {
            Error::ToolNotFound(tool) => {
                Error::HostError(format!("host client '{tool}' not found in PATH"))
            }
            other => other,
        })?;
        if !output.success() {
            return Err(Error::HostError(format!(
                "`{} {}` failed with {}",
                program,
                full.join(" "),
                output.describe_failure()
            )));
        }
        parse_plugins_reply(&output.stdout)
    }
}

/// Parse a `{"plugins": [{"name": ..., "active": ...}]}` reply
pub fn parse_plugins_reply(body: &str) -> Result<Vec<ActiveExtension>> {
    let reply: PluginsReply = serde_json::from_str(body)
        .map_err(|e| Error::HostError(format!("Unparsable host reply: {e}")))?;
    Ok(reply.plugins)
}

impl Host for CliHost<'_> {
    fn start(&self, path: &Path) -> Result<Vec<ActiveExtension>> {
        let path = path.to_string_lossy();
        self.call(&["plugin", "start", &path])
    }

    fn active(&self) -> Result<Vec<ActiveExtension>> {
        self.call(&["plugin", "list"])
    }
}

/// Result of handing an entry point to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "name")]
pub enum Activation {
    /// The plugin appeared among the active extensions
    Started(String),
    /// It did not appear before the activation timeout
    TimedOut(String),
}

fn is_running(extensions: &[ActiveExtension], basename: &str) -> bool {
    extensions
        .iter()
        .any(|ext| ext.active && ext.basename() == basename)
}

/// Start `entry_point` and wait until the host reports it running
///
/// The host starts plugins asynchronously, so the first status poll only
/// happens after the settle delay; polling then continues until the
/// activation timeout.
pub fn activate(host: &dyn Host, entry_point: &Path, config: &HostConfig) -> Result<Activation> {
    let basename = entry_point
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::HostError(format!("{} has no file name", entry_point.display())))?;

    info!("Starting {} on the host", entry_point.display());
    let started = host.start(entry_point)?;
    debug!("Host reports {} extensions after start", started.len());

    thread::sleep(config.settle_delay());
    let deadline = Instant::now() + config.activation_timeout();
    loop {
        if is_running(&host.active()?, &basename) {
            return Ok(Activation::Started(basename));
        }
        if Instant::now() >= deadline {
            return Ok(Activation::TimedOut(basename));
        }
        thread::sleep(config.poll_interval());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use crate::testing::{FakeHost, ScriptedRunner};
    use std::path::PathBuf;

    fn quick() -> HostConfig {
        HostConfig {
            command: vec!["lightning-cli".to_string()],
            settle_delay_ms: 0,
            activation_timeout_secs: 0,
            poll_interval_ms: 1,
        }
    }

    #[test]
    fn test_parse_reply() {
        let plugins = parse_plugins_reply(
            r#"{"command": "start", "plugins": [
                {"name": "/usr/libexec/c-lightning/plugins/pay", "active": true},
                {"name": "/p/summary/summary.py", "active": false}
            ]}"#,
        )
        .unwrap();
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].basename(), "pay");
        assert!(!plugins[1].active);
        assert!(parse_plugins_reply("not json").is_err());
    }

    #[test]
    fn test_started_when_listed() {
        let host = FakeHost::new();
        let entry = PathBuf::from("/p/summary/summary.py");
        assert_eq!(
            activate(&host, &entry, &quick()).unwrap(),
            Activation::Started("summary.py".to_string())
        );
        assert_eq!(host.started(), vec![entry]);
    }

    #[test]
    fn test_timeout_when_never_listed() {
        let host = FakeHost::new().refusing();
        let entry = PathBuf::from("/p/summary/summary.py");
        assert_eq!(
            activate(&host, &entry, &quick()).unwrap(),
            Activation::TimedOut("summary.py".to_string())
        );
    }

    #[test]
    fn test_cli_host_commands() {
        let runner = ScriptedRunner::new().respond(
            "lightning-cli",
            CommandOutput::ok(r#"{"plugins": [{"name": "/p/x/x.py"}]}"#),
        );
        let config = HostConfig {
            command: vec!["lightning-cli".to_string(), "--network=regtest".to_string()],
            ..quick()
        };
        let host = CliHost::new(&runner, &config);

        let reply = host.start(Path::new("/p/x/x.py")).unwrap();
        assert_eq!(reply, vec![ActiveExtension::new("/p/x/x.py")]);
        host.active().unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "lightning-cli --network=regtest plugin start /p/x/x.py",
                "lightning-cli --network=regtest plugin list",
            ]
        );
    }

    #[test]
    fn test_cli_host_failures() {
        let runner = ScriptedRunner::new().missing("lightning-cli");
        let host = CliHost::new(&runner, &quick());
        assert!(matches!(host.active(), Err(Error::HostError(_))));

        let runner = ScriptedRunner::new()
            .respond("lightning-cli", CommandOutput::failed(1, "Connection refused"));
        let host = CliHost::new(&runner, &quick());
        let err = host.start(Path::new("/p/x.py")).unwrap_err();
        assert!(err.to_string().contains("Connection refused"));
    }
}
