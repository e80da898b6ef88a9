//! Workspace variable reads.

use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::marshal::{marshal, JsonValue};
use crate::session::{SessionError, SessionHandle};

/// Fetch `name` from the session workspace as a JSON-safe value.
pub fn fetch_variable(name: &str, session: &dyn SessionHandle) -> Result<JsonValue, BridgeError> {
    if name.is_empty() {
        warn!("getVariable: empty variable_name provided");
        return Err(BridgeError::InvalidArgument(
            "Invalid variable_name: must be a non-empty string.".to_string(),
        ));
    }

    if !session.workspace_contains(name).map_err(engine_error)? {
        warn!("Variable '{}' not found in MATLAB workspace", name);
        return Err(BridgeError::NotFound(format!(
            "Variable '{}' not found in MATLAB workspace.",
            name
        )));
    }

    let native = session.workspace_get(name).map_err(engine_error)?;
    debug!("Fetched '{}' of MATLAB type {}", name, native.type_name());
    let value = marshal(&native);

    if let Err(e) = serde_json::to_string(&value) {
        warn!(
            "Failed to serialize value of '{}' (MATLAB type {}): {}",
            name,
            native.type_name(),
            e
        );
        return Err(BridgeError::Unserializable(format!(
            "Value for variable '{}' could not be JSON serialized after conversion. Original MATLAB type: {}",
            name,
            native.type_name()
        )));
    }

    info!("Successfully retrieved and converted variable '{}'", name);
    Ok(value)
}

/// Reading a variable submits no user code, so every session failure here is
/// an engine fault.
fn engine_error(err: SessionError) -> BridgeError {
    match err {
        SessionError::Execution(message) | SessionError::Engine(message) => {
            BridgeError::Engine(message)
        }
    }
}
