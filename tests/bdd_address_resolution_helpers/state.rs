//! Scenario state for address resolution and connection BDD tests.

use std::collections::HashMap;
use std::os::unix::net::UnixListener;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use mockable::MockEnv;
use podlink::engine::{ResolverSources, UnixUriMode};
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tempfile::TempDir;

/// Convenience alias for step outcomes.
pub type StepResult<T> = Result<T, String>;

/// Outcome of a resolution attempt.
#[derive(Clone, Debug)]
pub enum ResolutionOutcome {
    /// A unix address was found.
    Unix {
        /// The resolved address.
        address: String,
        /// The `Display` form of the source that supplied it.
        source: String,
    },
    /// Every unix source was exhausted.
    NoUnixCandidate,
    /// An SSH destination was found.
    Ssh {
        /// The destination URI.
        uri: String,
    },
    /// Resolution failed.
    Failed {
        /// The `Display` representation of the error.
        message: String,
    },
}

/// Outcome of a connection attempt through the facade.
#[derive(Clone, Debug)]
pub enum ConnectOutcome {
    /// The engine answered the liveness probe.
    Connected,
    /// A client was built but the engine did not answer.
    Unreachable {
        /// The address of the retained client.
        address: String,
    },
    /// No client could be built.
    Failed {
        /// The `Debug` representation of the error.
        detail: String,
    },
}

/// State shared across address resolution scenarios.
#[derive(ScenarioState)]
pub struct ResolutionState {
    /// Scratch directory holding documents and sockets.
    pub(crate) temp_dir: Slot<Arc<TempDir>>,
    /// Environment variables visible to the resolver.
    pub(crate) env_vars: Slot<Arc<Mutex<HashMap<String, String>>>>,
    /// Documents written so far, least relevant first.
    pub(crate) documents: Slot<Vec<Utf8PathBuf>>,
    /// Whether unix authorities are stripped.
    pub(crate) strip_authority: Slot<bool>,
    /// A listener kept open for the duration of the scenario.
    pub(crate) listener: Slot<Arc<UnixListener>>,
    /// Loopback port of the bastion under test.
    pub(crate) bastion_port: Slot<u16>,
    /// Outcome of the most recent resolution.
    pub(crate) outcome: Slot<ResolutionOutcome>,
    /// Outcome of the most recent connection attempt.
    pub(crate) connect_outcome: Slot<ConnectOutcome>,
}

#[expect(
    clippy::derivable_impls,
    reason = "ScenarioState guidance discourages deriving Default in this module"
)]
impl Default for ResolutionState {
    fn default() -> Self {
        Self {
            temp_dir: Slot::default(),
            env_vars: Slot::default(),
            documents: Slot::default(),
            strip_authority: Slot::default(),
            listener: Slot::default(),
            bastion_port: Slot::default(),
            outcome: Slot::default(),
            connect_outcome: Slot::default(),
        }
    }
}

impl ResolutionState {
    /// Returns the scratch directory root.
    pub(crate) fn root(&self) -> StepResult<Utf8PathBuf> {
        let dir = self
            .temp_dir
            .get()
            .ok_or_else(|| String::from("scratch directory should be initialised"))?;
        Utf8Path::from_path(dir.path())
            .map(Utf8Path::to_owned)
            .ok_or_else(|| String::from("scratch directory should be UTF-8"))
    }

    /// Returns the runtime directory probed by the resolver.
    pub(crate) fn runtime_dir(&self) -> StepResult<Utf8PathBuf> {
        Ok(self.root()?.join("runtime"))
    }

    /// Returns the default socket probed by the resolver.
    pub(crate) fn default_socket(&self) -> StepResult<Utf8PathBuf> {
        Ok(self.root()?.join("system/podman.sock"))
    }

    /// Records an environment variable.
    pub(crate) fn set_env_var(&self, key: &str, value: &str) -> StepResult<()> {
        let vars = self
            .env_vars
            .get()
            .ok_or_else(|| String::from("env vars should be initialised"))?;
        vars.lock()
            .map_err(|_| String::from("mutex poisoned"))?
            .insert(String::from(key), String::from(value));
        Ok(())
    }

    /// Creates a `MockEnv` from a snapshot of the recorded variables.
    pub(crate) fn mock_env(&self) -> StepResult<MockEnv> {
        let vars = self
            .env_vars
            .get()
            .ok_or_else(|| String::from("env vars should be initialised"))?
            .lock()
            .map_err(|_| String::from("mutex poisoned"))?
            .clone();

        let mut mock = MockEnv::new();
        mock.expect_string()
            .returning(move |key| vars.get(key).cloned());
        Ok(mock)
    }

    /// Builds resolver sources confined to the scratch directory.
    pub(crate) fn sources(&self) -> StepResult<ResolverSources> {
        Ok(ResolverSources {
            config_paths: self.documents.get().unwrap_or_default(),
            xdg_runtime_dir: Some(self.runtime_dir()?),
            default_socket: self.default_socket()?,
            unix_uri_mode: if self.strip_authority.get().unwrap_or(false) {
                UnixUriMode::StripAuthority
            } else {
                UnixUriMode::Verbatim
            },
        })
    }
}

/// Fixture providing fresh state for each scenario.
#[rstest::fixture]
pub fn resolution_state() -> ResolutionState {
    let state = ResolutionState::default();
    if let Ok(dir) = TempDir::new() {
        state.temp_dir.set(Arc::new(dir));
    }
    state.env_vars.set(Arc::new(Mutex::new(HashMap::new())));
    state
}
