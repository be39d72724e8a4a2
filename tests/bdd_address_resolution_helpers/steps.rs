//! Given and When step definitions for address resolution BDD tests.

use std::os::unix::net::UnixListener;
use std::sync::Arc;

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use podlink::engine::ssh::SshOptions;
use podlink::engine::{AddressResolver, ConnectFailure, EngineConnector, UnixResolution};
use rstest_bdd_macros::{given, when};

use super::state::{ConnectOutcome, ResolutionOutcome, ResolutionState, StepResult};

/// Write a document into the scratch directory and append it to the list.
fn write_document(resolution_state: &ResolutionState, name: &str, body: &str) -> StepResult<()> {
    let root = resolution_state.root()?;
    let dir = Dir::open_ambient_dir(&root, ambient_authority())
        .map_err(|e| format!("should open scratch dir: {e}"))?;
    dir.write(name, body)
        .map_err(|e| format!("should write {name}: {e}"))?;

    let mut documents = resolution_state.documents.get().unwrap_or_default();
    documents.push(root.join(name));
    resolution_state.documents.set(documents);
    Ok(())
}

/// Create an empty file standing in for a socket.
fn touch(path: &Utf8PathBuf) -> StepResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| format!("{path} should have a parent"))?;
    std::fs::create_dir_all(parent).map_err(|e| format!("should create {parent}: {e}"))?;
    std::fs::write(path, b"").map_err(|e| format!("should create {path}: {e}"))
}

#[given("CONTAINER_HOST is set to \"{value}\"")]
fn container_host_is_set_to(resolution_state: &ResolutionState, value: String) -> StepResult<()> {
    resolution_state.set_env_var("CONTAINER_HOST", &value)
}

#[given("CONTAINER_HOST is empty")]
fn container_host_is_empty(resolution_state: &ResolutionState) -> StepResult<()> {
    resolution_state.set_env_var("CONTAINER_HOST", "")
}

#[given("a containers.conf document \"{name}\" with unix destination \"{uri}\"")]
fn unix_document(resolution_state: &ResolutionState, name: String, uri: String) -> StepResult<()> {
    write_document(
        resolution_state,
        &name,
        &format!("[engine.service_destinations.local]\nuri = \"{uri}\"\n"),
    )
}

#[given("a containers.conf document \"{name}\" whose active unix service points at \"{uri}\"")]
fn active_unix_document(
    resolution_state: &ResolutionState,
    name: String,
    uri: String,
) -> StepResult<()> {
    write_document(
        resolution_state,
        &name,
        &format!(
            "[engine]\nactive_service = \"zulu\"\n\n\
             [engine.service_destinations.alpha]\nuri = \"unix:///run/inactive.sock\"\n\n\
             [engine.service_destinations.zulu]\nuri = \"{uri}\"\n"
        ),
    )
}

#[given(
    "a containers.conf document \"{name}\" with ssh destination \"{uri}\" and identity \"{identity}\""
)]
fn ssh_document(
    resolution_state: &ResolutionState,
    name: String,
    uri: String,
    identity: String,
) -> StepResult<()> {
    write_document(
        resolution_state,
        &name,
        &format!(
            "[engine.service_destinations.remote]\nuri = \"{uri}\"\nidentity = \"{identity}\"\n"
        ),
    )
}

#[given("a containers.conf document \"{name}\" with ssh destination \"{uri}\" and no identity")]
fn ssh_document_without_identity(
    resolution_state: &ResolutionState,
    name: String,
    uri: String,
) -> StepResult<()> {
    write_document(
        resolution_state,
        &name,
        &format!("[engine.service_destinations.remote]\nuri = \"{uri}\"\n"),
    )
}

#[given("unix authorities are stripped")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
fn unix_authorities_are_stripped(resolution_state: &ResolutionState) -> StepResult<()> {
    resolution_state.strip_authority.set(true);
    Ok(())
}

#[given("a socket exists in the runtime directory")]
fn runtime_socket_exists(resolution_state: &ResolutionState) -> StepResult<()> {
    touch(&resolution_state.runtime_dir()?.join("podman/podman.sock"))
}

#[given("a socket exists at the default location")]
fn default_socket_exists(resolution_state: &ResolutionState) -> StepResult<()> {
    touch(&resolution_state.default_socket()?)
}

#[given("an engine socket that never answers")]
fn silent_engine_socket(resolution_state: &ResolutionState) -> StepResult<()> {
    let path = resolution_state.root()?.join("silent.sock");
    let listener = UnixListener::bind(&path).map_err(|e| format!("should bind {path}: {e}"))?;
    resolution_state.listener.set(Arc::new(listener));
    resolution_state.set_env_var("CONTAINER_HOST", &format!("unix://{path}"))
}

#[given("a bastion port with nothing listening")]
fn closed_bastion_port(resolution_state: &ResolutionState) -> StepResult<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .map_err(|e| format!("should bind loopback: {e}"))?;
    let port = listener
        .local_addr()
        .map_err(|e| format!("should read local address: {e}"))?
        .port();
    drop(listener);
    resolution_state.bastion_port.set(port);
    Ok(())
}

#[given("a containers.conf document \"{name}\" pointing at the bastion with the test identity")]
fn bastion_document(resolution_state: &ResolutionState, name: String) -> StepResult<()> {
    let port = resolution_state
        .bastion_port
        .get()
        .ok_or_else(|| String::from("bastion port should be chosen first"))?;
    let identity = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/keys/id_ed25519");
    ssh_document(
        resolution_state,
        name,
        format!("ssh://core@127.0.0.1:{port}/run/podman/podman.sock"),
        identity.to_string(),
    )
}

#[when("the unix address is resolved")]
fn the_unix_address_is_resolved(resolution_state: &ResolutionState) -> StepResult<()> {
    let env = resolution_state.mock_env()?;
    let resolver = AddressResolver::new(&env, resolution_state.sources()?);

    let outcome = match resolver.resolve_unix() {
        UnixResolution::Resolved { address, source } => ResolutionOutcome::Unix {
            address,
            source: source.to_string(),
        },
        UnixResolution::NoCandidate { .. } => ResolutionOutcome::NoUnixCandidate,
    };
    resolution_state.outcome.set(outcome);
    Ok(())
}

#[when("the ssh destination is resolved")]
fn the_ssh_destination_is_resolved(resolution_state: &ResolutionState) -> StepResult<()> {
    let env = resolution_state.mock_env()?;
    let resolver = AddressResolver::new(&env, resolution_state.sources()?);

    let outcome = match resolver.resolve_ssh() {
        Ok(destination) => ResolutionOutcome::Ssh {
            uri: destination.uri,
        },
        Err(e) => ResolutionOutcome::Failed {
            message: e.to_string(),
        },
    };
    resolution_state.outcome.set(outcome);
    Ok(())
}

#[when("the engine is connected")]
fn the_engine_is_connected(resolution_state: &ResolutionState) -> StepResult<()> {
    let env = resolution_state.mock_env()?;
    let resolver = AddressResolver::new(&env, resolution_state.sources()?);
    let options = SshOptions {
        known_hosts: None,
        strict_host_keys: false,
    };

    let outcome = match EngineConnector::connect_resolved(&resolver, &options) {
        Ok(_) => ConnectOutcome::Connected,
        Err(ConnectFailure::Unreachable { client, .. }) => ConnectOutcome::Unreachable {
            address: client.address().to_owned(),
        },
        Err(ConnectFailure::Build(error)) => ConnectOutcome::Failed {
            detail: format!("{error:?}"),
        },
    };
    resolution_state.connect_outcome.set(outcome);
    Ok(())
}
