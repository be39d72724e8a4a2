//! Then step definitions for address resolution BDD tests.

use rstest_bdd_macros::then;

use super::state::{ConnectOutcome, ResolutionOutcome, ResolutionState, StepResult};

fn outcome(resolution_state: &ResolutionState) -> StepResult<ResolutionOutcome> {
    resolution_state
        .outcome
        .get()
        .ok_or_else(|| String::from("resolution should have been attempted"))
}

fn resolved_address(resolution_state: &ResolutionState) -> StepResult<String> {
    match outcome(resolution_state)? {
        ResolutionOutcome::Unix { address, .. } => Ok(address),
        other => Err(format!("expected a unix address, got {other:?}")),
    }
}

fn connect_outcome(resolution_state: &ResolutionState) -> StepResult<ConnectOutcome> {
    resolution_state
        .connect_outcome
        .get()
        .ok_or_else(|| String::from("connection should have been attempted"))
}

fn failure_detail(resolution_state: &ResolutionState) -> StepResult<String> {
    match connect_outcome(resolution_state)? {
        ConnectOutcome::Failed { detail } => Ok(detail),
        other => Err(format!("expected a build failure, got {other:?}")),
    }
}

#[then("the address is \"{expected}\"")]
fn the_address_is(resolution_state: &ResolutionState, expected: String) -> StepResult<()> {
    let address = resolved_address(resolution_state)?;
    if address == expected {
        Ok(())
    } else {
        Err(format!("expected address {expected}, got {address}"))
    }
}

#[then("the source is the environment")]
fn the_source_is_the_environment(resolution_state: &ResolutionState) -> StepResult<()> {
    match outcome(resolution_state)? {
        ResolutionOutcome::Unix { source, .. } if source.contains("CONTAINER_HOST") => Ok(()),
        other => Err(format!("expected the environment source, got {other:?}")),
    }
}

#[then("the source is document \"{name}\"")]
fn the_source_is_document(resolution_state: &ResolutionState, name: String) -> StepResult<()> {
    match outcome(resolution_state)? {
        ResolutionOutcome::Unix { source, .. } if source.contains(&name) => Ok(()),
        other => Err(format!("expected document {name} as source, got {other:?}")),
    }
}

#[then("the address points into the runtime directory")]
fn the_address_points_into_runtime_dir(resolution_state: &ResolutionState) -> StepResult<()> {
    let expected = format!(
        "unix://{}",
        resolution_state.runtime_dir()?.join("podman/podman.sock")
    );
    the_address_is(resolution_state, expected)
}

#[then("the address points at the default socket")]
fn the_address_points_at_default_socket(resolution_state: &ResolutionState) -> StepResult<()> {
    let expected = format!("unix://{}", resolution_state.default_socket()?);
    the_address_is(resolution_state, expected)
}

#[then("no unix candidate is found")]
fn no_unix_candidate_is_found(resolution_state: &ResolutionState) -> StepResult<()> {
    match outcome(resolution_state)? {
        ResolutionOutcome::NoUnixCandidate => Ok(()),
        other => Err(format!("expected no unix candidate, got {other:?}")),
    }
}

#[then("the ssh destination is \"{expected}\"")]
fn the_ssh_destination_is(resolution_state: &ResolutionState, expected: String) -> StepResult<()> {
    match outcome(resolution_state)? {
        ResolutionOutcome::Ssh { uri } if uri == expected => Ok(()),
        other => Err(format!("expected ssh destination {expected}, got {other:?}")),
    }
}

#[then("no ssh destination is found")]
fn no_ssh_destination_is_found(resolution_state: &ResolutionState) -> StepResult<()> {
    match outcome(resolution_state)? {
        ResolutionOutcome::Failed { message } if message.contains("no ssh destination") => Ok(()),
        other => Err(format!("expected no ssh destination, got {other:?}")),
    }
}

#[then("the engine is unreachable and the client is kept")]
fn the_engine_is_unreachable(resolution_state: &ResolutionState) -> StepResult<()> {
    match connect_outcome(resolution_state)? {
        ConnectOutcome::Unreachable { address } if address.ends_with("silent.sock") => Ok(()),
        other => Err(format!("expected an unreachable client, got {other:?}")),
    }
}

#[then("the connection fails with an ssh handshake error")]
fn the_connection_fails_with_handshake_error(
    resolution_state: &ResolutionState,
) -> StepResult<()> {
    let detail = failure_detail(resolution_state)?;
    if detail.contains("HandshakeFailed") {
        Ok(())
    } else {
        Err(format!("expected HandshakeFailed, got {detail}"))
    }
}

#[then("the connection fails because no ssh destination exists")]
fn the_connection_fails_without_destination(
    resolution_state: &ResolutionState,
) -> StepResult<()> {
    let detail = failure_detail(resolution_state)?;
    if detail.contains("NoSshCandidate") {
        Ok(())
    } else {
        Err(format!("expected NoSshCandidate, got {detail}"))
    }
}

#[then("the connection fails with an unsupported scheme error")]
fn the_connection_fails_with_unsupported_scheme(
    resolution_state: &ResolutionState,
) -> StepResult<()> {
    let detail = failure_detail(resolution_state)?;
    if detail.contains("UnsupportedScheme") {
        Ok(())
    } else {
        Err(format!("expected UnsupportedScheme, got {detail}"))
    }
}
