//! Line protocol spoken to a MATLAB-compatible interpreter over stdin/stdout.
//!
//! Every command is wrapped into a single-line *frame*: the body runs inside a
//! `try`/`catch`, a caught error is printed after an error marker, and an end
//! marker always closes the frame. The reader collects stdout lines until the
//! end marker and splits them into output and error text.

use std::io::BufRead;

use uuid::Uuid;

use super::{NativeValue, SessionError};

/// Workspace name that holds a caught error while a frame runs.
pub const ERROR_VAR: &str = "mcpBridgeErr";
/// Workspace name the variable probe binds its subject to.
pub const VALUE_VAR: &str = "mcpBridgeVal";

/// Sentinel lines delimiting one frame's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub error: String,
    pub end: String,
}

impl Markers {
    pub fn new(nonce: &str) -> Self {
        Self {
            error: format!("__MCP_BRIDGE_ERR_{}__", nonce),
            end: format!("__MCP_BRIDGE_END_{}__", nonce),
        }
    }

    /// Markers with a fresh random nonce, so user output cannot forge them.
    pub fn random() -> Self {
        Self::new(&Uuid::new_v4().simple().to_string())
    }
}

/// Decoded response of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub output: String,
    pub error: Option<String>,
}

impl Response {
    pub fn into_result(self) -> Result<String, SessionError> {
        match self.error {
            Some(message) => Err(SessionError::Execution(message)),
            None => Ok(self.output),
        }
    }
}

/// Render `text` as a MATLAB char-array expression. Quotes are doubled and
/// line breaks become `char(10)` so the result fits on one line.
pub fn string_literal(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let parts: Vec<String> = normalized
        .split('\n')
        .map(|line| format!("'{}'", line.replace('\'', "''")))
        .collect();
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("[{}]", parts.join(" char(10) "))
    }
}

/// MATLAB variable name rule: a letter followed by letters, digits or `_`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Wrap `body` into a single-line frame. `body` must end with a statement
/// separator.
pub fn frame(body: &str, markers: &Markers) -> String {
    format!(
        "try, {body} catch {err}, fprintf('\\n%s\\n', '{err_marker}'); disp({err}.message); end, \
         clear {err} {val}; fprintf('\\n%s\\n', '{end_marker}');",
        body = body,
        err = ERROR_VAR,
        val = VALUE_VAR,
        err_marker = markers.error,
        end_marker = markers.end,
    )
}

pub fn run_script_body(path: &str) -> String {
    format!("run({});", string_literal(path))
}

pub fn eval_body(code: &str) -> String {
    format!("eval({});", string_literal(code))
}

/// `name` must already satisfy [`is_identifier`].
pub fn exists_body(name: &str) -> String {
    format!("fprintf('%d\\n', exist('{}', 'var'));", name)
}

/// Probe printing class, size, payload kind and payload of `name`.
///
/// Real 2-D numeric and logical arrays are printed in row-major order with
/// full double precision; single-row char arrays and string scalars are
/// printed verbatim; any other value is rendered with `disp`. `name` must
/// already satisfy [`is_identifier`].
pub fn probe_body(name: &str) -> String {
    let v = VALUE_VAR;
    format!(
        "{v} = {name}; fprintf('%s\\n', class({v})); fprintf('%d ', size({v})); fprintf('\\n'); \
         if (isnumeric({v}) || islogical({v})) && isreal({v}) && ndims({v}) == 2, \
         fprintf('numeric\\n'); fprintf('%.17g ', full(double(reshape({v}.', 1, [])))); fprintf('\\n'); \
         elseif ischar({v}) && size({v}, 1) <= 1, \
         fprintf('text\\n'); fprintf('%s', {v}); fprintf('\\n'); \
         elseif isstring({v}) && isscalar({v}), \
         fprintf('text\\n'); fprintf('%s', char({v})); fprintf('\\n'); \
         else, fprintf('other\\n'); disp({v}); end",
        v = v,
        name = name,
    )
}

/// Read one frame's response.
///
/// The interpreter prints `prompt` once before running the frame, so a single
/// prefix is stripped from the first line only. Later lines are kept verbatim.
pub fn read_response<R: BufRead>(
    reader: &mut R,
    markers: &Markers,
    prompt: &str,
) -> Result<Response, SessionError> {
    let mut output: Vec<String> = Vec::new();
    let mut error: Option<Vec<String>> = None;
    let mut buf = String::new();
    let mut first = true;

    loop {
        buf.clear();
        let read = reader
            .read_line(&mut buf)
            .map_err(|e| SessionError::Engine(format!("failed to read from MATLAB: {}", e)))?;
        if read == 0 {
            return Err(SessionError::Engine(
                "MATLAB process closed its output stream".to_string(),
            ));
        }

        let mut line = buf.trim_end_matches(['\n', '\r']);
        if first {
            first = false;
            if !prompt.is_empty() {
                line = line.strip_prefix(prompt).unwrap_or(line);
            }
        }
        if line == markers.end {
            break;
        }
        if line == markers.error {
            error = Some(Vec::new());
            continue;
        }
        match error.as_mut() {
            Some(lines) => lines.push(line.to_string()),
            None => output.push(line.to_string()),
        }
    }

    Ok(Response {
        output: output.join("\n"),
        error: error.map(|lines| lines.join("\n").trim().to_string()),
    })
}

/// Parse the `exist(..., 'var')` answer.
pub fn parse_exists(output: &str) -> Result<bool, SessionError> {
    match output.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(SessionError::Engine(format!(
            "unexpected answer to existence check: {:?}",
            other
        ))),
    }
}

/// Turn probe output into a [`NativeValue`].
pub fn parse_probe(output: &str) -> Result<NativeValue, SessionError> {
    let mut lines = output.split('\n');
    let malformed = || SessionError::Engine(format!("malformed variable probe: {:?}", output));

    let class = lines.next().map(str::trim).filter(|c| !c.is_empty()).ok_or_else(malformed)?;
    let shape = lines
        .next()
        .ok_or_else(malformed)?
        .split_whitespace()
        .map(|d| d.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    let kind = lines.next().map(str::trim).ok_or_else(malformed)?;
    let payload = lines.collect::<Vec<_>>().join("\n");

    let value = match kind {
        "numeric" => numeric_value(class, shape, &payload),
        "text" => NativeValue::Text(
            payload
                .strip_suffix('\n')
                .unwrap_or(&payload)
                .to_string(),
        ),
        "other" => opaque(class, &payload),
        _ => return Err(malformed()),
    };
    Ok(value)
}

fn numeric_value(class: &str, shape: Vec<usize>, payload: &str) -> NativeValue {
    let parsed: Result<Vec<f64>, _> = payload.split_whitespace().map(str::parse::<f64>).collect();
    let data = match parsed {
        Ok(data) if data.len() == shape.iter().product::<usize>() => data,
        _ => return opaque(class, payload),
    };

    let logical = class == "logical";
    if !shape.is_empty() && shape.iter().all(|&d| d == 1) {
        return if logical {
            NativeValue::Boolean(data[0] != 0.0)
        } else {
            NativeValue::Scalar(data[0])
        };
    }
    if logical {
        NativeValue::BooleanArray {
            shape,
            data: data.into_iter().map(|v| v != 0.0).collect(),
        }
    } else {
        NativeValue::NumericArray { shape, data }
    }
}

fn opaque(class: &str, payload: &str) -> NativeValue {
    let display = payload.trim_matches('\n');
    NativeValue::Opaque {
        type_tag: class.to_string(),
        display: (!display.trim().is_empty()).then(|| display.to_string()),
    }
}
