use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::{AbortSignal, Script, ScriptEngine};
use crate::error::{BridgeError, Result};

/// How a script thread ended
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    Completed,
    Failed(String),
    Aborted,
    Panicked,
}

struct RunningScript {
    abort: Arc<AbortSignal>,
    handle: JoinHandle<ScriptOutcome>,
}

/// Runs each script on its own OS thread with its own session
pub struct ScriptRunner {
    engine: Arc<ScriptEngine>,
    scripts: HashMap<String, RunningScript>,
}

impl ScriptRunner {
    pub fn new(engine: Arc<ScriptEngine>) -> Self {
        Self {
            engine,
            scripts: HashMap::new(),
        }
    }

    /// Spawn a script; a script with the same id must not still be registered
    pub fn start(&mut self, mut script: Box<dyn Script>) -> Result<()> {
        let id = script.id().to_string();
        if self.scripts.contains_key(&id) {
            return Err(BridgeError::InvalidState(format!(
                "script {} is already running",
                id
            )));
        }

        let abort = Arc::new(AbortSignal::new());
        let session = self.engine.session_with_signal(id.clone(), abort.clone());
        let name = script.name();
        info!(target: "scripting", "Starting script: {} ({})", name, id);

        let thread_abort = abort.clone();
        let thread_id = id.clone();
        let handle = thread::Builder::new()
            .name(format!("script-{}", id))
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    script.run(&session)
                }));
                match result {
                    Ok(Ok(())) => {
                        info!(target: "scripting", "Script {} completed", thread_id);
                        ScriptOutcome::Completed
                    }
                    Ok(Err(_)) if thread_abort.is_aborted() => {
                        warn!(target: "scripting", "Script {} aborted", thread_id);
                        ScriptOutcome::Aborted
                    }
                    Ok(Err(e)) => {
                        error!(target: "scripting", "Script {} failed: {:#}", thread_id, e);
                        ScriptOutcome::Failed(format!("{:#}", e))
                    }
                    Err(e) => {
                        error!(target: "scripting", "Script {} panicked: {:?}", thread_id, e);
                        ScriptOutcome::Panicked
                    }
                }
            })
            .map_err(|e| BridgeError::InvalidState(format!("cannot spawn script {}: {}", id, e)))?;

        self.scripts.insert(id, RunningScript { abort, handle });
        Ok(())
    }

    /// Abort a script: its current wait returns `Cancelled` and later calls fail
    pub fn abort(&self, id: &str) -> bool {
        match self.scripts.get(id) {
            Some(script) => {
                debug!(target: "scripting", "Aborting script {}", id);
                script.abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn abort_all(&self) {
        for (id, script) in &self.scripts {
            debug!(target: "scripting", "Aborting script {}", id);
            script.abort.abort();
        }
    }

    /// IDs of scripts whose thread has not finished yet
    pub fn running(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .scripts
            .iter()
            .filter(|(_, script)| !script.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Wait for one script to finish and forget it
    pub fn join(&mut self, id: &str) -> Option<ScriptOutcome> {
        let script = self.scripts.remove(id)?;
        Some(script.handle.join().unwrap_or(ScriptOutcome::Panicked))
    }

    /// Wait for every script, sorted by id
    pub fn join_all(&mut self) -> Vec<(String, ScriptOutcome)> {
        let mut outcomes: Vec<(String, ScriptOutcome)> = self
            .scripts
            .drain()
            .map(|(id, script)| {
                let outcome = script.handle.join().unwrap_or(ScriptOutcome::Panicked);
                (id, outcome)
            })
            .collect();
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityDefinition, EntityKind, SystemModel};
    use crate::scripting::ScriptManager;
    use std::time::Duration;

    #[derive(Default)]
    struct WaitForeverScript;

    impl Script for WaitForeverScript {
        fn id(&self) -> &'static str {
            "wait_forever"
        }

        fn name(&self) -> &'static str {
            "Wait Forever"
        }

        fn description(&self) -> &'static str {
            "Blocks on an event that never comes"
        }

        fn run(&mut self, manager: &dyn ScriptManager) -> anyhow::Result<()> {
            let outcome = manager.wait_for_event("/sys/never", Duration::from_secs(3600))?;
            anyhow::ensure!(outcome.is_cancelled(), "expected cancellation");
            manager.info("unreachable")?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct PanickingScript;

    impl Script for PanickingScript {
        fn id(&self) -> &'static str {
            "panics"
        }

        fn name(&self) -> &'static str {
            "Panics"
        }

        fn description(&self) -> &'static str {
            "Always panics"
        }

        fn run(&mut self, _manager: &dyn ScriptManager) -> anyhow::Result<()> {
            panic!("script bug");
        }
    }

    fn engine() -> Arc<ScriptEngine> {
        ScriptEngine::builder(SystemModel::new(vec![EntityDefinition::new(
            "/sys/never",
            EntityKind::Event,
        )]))
        .build()
        .unwrap()
    }

    #[test]
    fn test_abort_cancels_wait() {
        let engine = engine();
        let mut runner = ScriptRunner::new(engine.clone());
        runner.start(Box::new(WaitForeverScript)).unwrap();

        let id = engine.resolver().resolve("/sys/never").unwrap();
        while engine.bus.event_waiters(id) == 0 {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(runner.running(), vec!["wait_forever".to_string()]);

        assert!(runner.abort("wait_forever"));
        assert_eq!(runner.join("wait_forever"), Some(ScriptOutcome::Aborted));
        assert_eq!(engine.bus.event_waiters(id), 0);
    }

    #[test]
    fn test_duplicate_start_rejected() {
        let mut runner = ScriptRunner::new(engine());
        runner.start(Box::new(WaitForeverScript)).unwrap();
        assert!(runner
            .start(Box::new(WaitForeverScript))
            .unwrap_err()
            .is_invalid_state());
        runner.abort_all();
        runner.join_all();
    }

    #[test]
    fn test_panic_is_contained() {
        let mut runner = ScriptRunner::new(engine());
        runner.start(Box::new(PanickingScript)).unwrap();
        assert_eq!(runner.join("panics"), Some(ScriptOutcome::Panicked));
        assert!(!runner.abort("panics"));
    }
}
