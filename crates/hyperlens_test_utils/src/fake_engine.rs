//! Shell-script engines for adapter, server and CLI tests.

use hyperlens_protocol::EngineSettings;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SHELL: &str = "/bin/sh";
const SCRIPT: &str = "engine.sh";
const RESPONSE: &str = "response.json";
const STDERR: &str = "stderr.txt";
const ARGS_LOG: &str = "args.log";
const CALL_SEPARATOR: &str = "--end-of-call--";

/// A fake engine living in its own temp directory. Removed on drop.
pub struct FakeEngine {
    dir: TempDir,
}

impl FakeEngine {
    /// Prints `document` on stdout and exits 0.
    pub fn responding(document: &Value) -> Self {
        let engine = Self::scratch();
        engine.write(RESPONSE, &document.to_string());
        engine.install(&format!("cat '{}'\nexit 0", engine.file(RESPONSE).display()));
        engine
    }

    /// Prints `stderr` on stderr and exits with `code`.
    pub fn failing(code: i32, stderr: &str) -> Self {
        let engine = Self::scratch();
        engine.write(STDERR, stderr);
        engine.install(&format!(
            "cat '{}' >&2\nexit {}",
            engine.file(STDERR).display(),
            code
        ));
        engine
    }

    /// Runs `body` after the argument logging. `$FAKE_DIR` points at the
    /// engine's directory.
    pub fn from_script(body: &str) -> Self {
        let engine = Self::scratch();
        engine.install(body);
        engine
    }

    /// Starts a background `sleep`, records its pid in `child.pid` and waits.
    /// Used to check that cancellation reaches the whole process group.
    pub fn hanging() -> Self {
        Self::from_script("sleep 30 &\necho $! > \"$FAKE_DIR/child.pid\"\nwait\nexit 0")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn script_path(&self) -> PathBuf {
        self.file(SCRIPT)
    }

    /// Settings that run the script through `/bin/sh`.
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            program: PathBuf::from(SHELL),
            args: vec![self.script_path().display().to_string()],
        }
    }

    /// `[engine]` section for a Hyperlens `config.toml`.
    pub fn config_toml(&self) -> String {
        format!(
            "[engine]\nprogram = \"{}\"\nargs = [\"{}\"]\n",
            SHELL,
            self.script_path().display()
        )
    }

    /// Argument lists of every call so far, oldest first.
    pub fn recorded_calls(&self) -> Vec<Vec<String>> {
        let log = fs::read_to_string(self.file(ARGS_LOG)).unwrap_or_default();
        let mut calls = Vec::new();
        let mut current = Vec::new();
        for line in log.lines() {
            if line == CALL_SEPARATOR {
                calls.push(std::mem::take(&mut current));
            } else {
                current.push(line.to_string());
            }
        }
        calls
    }

    /// Argument list of the most recent call.
    pub fn recorded_args(&self) -> Vec<String> {
        self.recorded_calls().pop().unwrap_or_default()
    }

    /// Pid written by [`FakeEngine::hanging`], once the script got that far.
    pub fn child_pid(&self) -> Option<u32> {
        fs::read_to_string(self.file("child.pid"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    fn scratch() -> Self {
        let dir = tempfile::tempdir().expect("create fake engine dir");
        Self { dir }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.file(name), contents).expect("write fake engine file");
    }

    fn install(&self, body: &str) {
        let script = format!(
            "#!/bin/sh\nFAKE_DIR='{dir}'\nfor arg in \"$@\"; do printf '%s\\n' \"$arg\" >> '{log}'; done\necho '{sep}' >> '{log}'\n{body}\n",
            dir = self.dir.path().display(),
            log = self.file(ARGS_LOG).display(),
            sep = CALL_SEPARATOR,
            body = body,
        );
        self.write(SCRIPT, &script);
    }
}
