//! Remote control of the test accessory server.
//!
//! Every operation reads its parameters from a [`BridgeRequest`], opens a
//! fresh connection to the accessory server, issues exactly one XML-RPC
//! call and closes the connection again. Nothing is retried.
//!
//! ```no_run
//! use matterbuild_sdk::bridge::{AccessoryServerBridge, BridgeRequest};
//!
//! let bridge = AccessoryServerBridge::new("127.0.0.1", 9000);
//! let request = BridgeRequest::new()
//!     .with("discriminator", 3840)
//!     .with("port", 5540);
//! bridge.start(&request)?;
//! bridge.stop(&BridgeRequest::new())?;
//! # Ok::<(), matterbuild_sdk::bridge::BridgeError>(())
//! ```

pub mod xmlrpc;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use xmlrpc::XmlRpcValue;

/// Registration key used when a request does not name one.
pub const DEFAULT_REGISTER_KEY: &str = "default";

/// Accessory server port.
pub const DEFAULT_PORT: u16 = 9000;

/// Accessory server address. On Linux the server runs in a separate network
/// namespace at a fixed address.
#[cfg(target_os = "linux")]
pub const DEFAULT_HOST: &str = "10.10.10.5";
#[cfg(not(target_os = "linux"))]
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// `start` parameters and the accessory command-line flag each maps to.
const START_OPTIONS: &[(&str, &str)] = &[
    ("discriminator", "--discriminator"),
    ("port", "--secured-device-port"),
    ("kvs", "--KVS"),
    ("minCommissioningTimeout", "--min_commissioning_timeout"),
    ("filepath", "--filepath"),
    ("otaDownloadPath", "--otaDownloadPath"),
];

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("key not recognized: {0}")]
    UnknownKey(String),

    #[error("unknown bridge operation '{0}'")]
    UnknownOperation(String),

    #[error("invalid parameter '{0}', expected name=value")]
    InvalidParameter(String),

    #[error("accessory server request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("accessory server fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("unexpected response from accessory server: {0}")]
    MalformedResponse(String),
}

/// One named request value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestValue {
    pub name: String,
    pub value: Value,
}

impl FromStr for RequestValue {
    type Err = BridgeError;

    /// Parses `name=value`. The value is read as JSON when it parses as
    /// such (`1234`, `true`, `"x"`), otherwise kept as a plain string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, raw) = s
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| BridgeError::InvalidParameter(s.to_string()))?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Ordered list of named values carried by a bridge command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    #[serde(default)]
    pub values: Vec<RequestValue>,
}

impl BridgeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push(RequestValue {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// First value named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.name == name).map(|v| &v.value)
    }

    /// `registerKey`, or [`DEFAULT_REGISTER_KEY`].
    pub fn register_key(&self) -> String {
        self.get("registerKey")
            .map(value_to_arg)
            .unwrap_or_else(|| DEFAULT_REGISTER_KEY.to_string())
    }

    /// Translates the request into accessory command-line options, in request
    /// order. `registerKey` is skipped; any other unmapped name is an error.
    pub fn start_options(&self) -> Result<Vec<String>, BridgeError> {
        let mut options = Vec::new();
        for item in &self.values {
            if let Some((_, flag)) = START_OPTIONS.iter().find(|(name, _)| *name == item.name) {
                options.push(flag.to_string());
                options.push(value_to_arg(&item.value));
            } else if item.name != "registerKey" {
                return Err(BridgeError::UnknownKey(item.name.clone()));
            }
        }
        Ok(options)
    }
}

/// Renders a value as an accessory command-line argument. Strings pass
/// through unquoted; booleans and null use the accessory's own spelling
/// (`True`, `False`, `None`); anything else uses its JSON text.
fn value_to_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Bridge operations, named as the accessory server names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOperation {
    Start,
    Stop,
    Reboot,
    FactoryReset,
    WaitForMessage,
    CreateOtaImage,
    CompareFiles,
}

impl BridgeOperation {
    pub const ALL: [BridgeOperation; 7] = [
        BridgeOperation::Start,
        BridgeOperation::Stop,
        BridgeOperation::Reboot,
        BridgeOperation::FactoryReset,
        BridgeOperation::WaitForMessage,
        BridgeOperation::CreateOtaImage,
        BridgeOperation::CompareFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeOperation::Start => "start",
            BridgeOperation::Stop => "stop",
            BridgeOperation::Reboot => "reboot",
            BridgeOperation::FactoryReset => "factoryReset",
            BridgeOperation::WaitForMessage => "waitForMessage",
            BridgeOperation::CreateOtaImage => "createOtaImage",
            BridgeOperation::CompareFiles => "compareFiles",
        }
    }
}

impl FromStr for BridgeOperation {
    type Err = BridgeError;

    /// Accepts the remote method name or its snake_case spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BridgeOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == s || op.as_str() == snake_to_camel(s))
            .ok_or_else(|| BridgeError::UnknownOperation(s.to_string()))
    }
}

fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Delivers one XML-RPC call.
pub trait RpcTransport {
    fn call(&self, method: &str, params: Vec<XmlRpcValue>) -> Result<(), BridgeError>;
}

/// XML-RPC over HTTP POST, one short-lived client per call.
///
/// Calls never time out: `waitForMessage` blocks on the server until the
/// accessory prints the awaited line. Proxy settings are ignored since the
/// server is always on the local network.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    url: String,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            url: format!("http://{}:{}/", host, port),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl RpcTransport for HttpTransport {
    fn call(&self, method: &str, params: Vec<XmlRpcValue>) -> Result<(), BridgeError> {
        let body = xmlrpc::method_call(method, &params);
        tracing::debug!("POST {} {}", self.url, method);

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("matterbuild/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .no_proxy()
            .build()?;
        let response = client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()?
            .error_for_status()?;
        let text = response.text()?;
        xmlrpc::check_response(&text)
    }
}

/// Client for the accessory server's control interface.
#[derive(Debug, Clone, Default)]
pub struct AccessoryServerBridge<T = HttpTransport> {
    transport: T,
}

impl AccessoryServerBridge {
    /// Bridge to the accessory server at `host:port` over HTTP.
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_transport(HttpTransport::new(host, port))
    }
}

impl<T: RpcTransport> AccessoryServerBridge<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call(&self, method: &str, params: Vec<XmlRpcValue>) -> Result<(), BridgeError> {
        tracing::info!("Accessory server: {}", method);
        self.transport.call(method, params)
    }

    /// `start(key, options)`; unrecognized parameters fail before any call.
    pub fn start(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        let key = request.register_key();
        let options = request
            .start_options()?
            .into_iter()
            .map(XmlRpcValue::from)
            .collect();
        self.call("start", vec![key.into(), XmlRpcValue::Array(options)])
    }

    pub fn stop(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        self.call("stop", vec![request.register_key().into()])
    }

    pub fn reboot(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        self.call("reboot", vec![request.register_key().into()])
    }

    pub fn factory_reset(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        self.call("factoryReset", vec![request.register_key().into()])
    }

    /// `waitForMessage(key, [message])`; a missing message is sent as nil.
    pub fn wait_for_message(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        let message = XmlRpcValue::from(request.get("message"));
        self.call(
            "waitForMessage",
            vec![
                request.register_key().into(),
                XmlRpcValue::Array(vec![message]),
            ],
        )
    }

    pub fn create_ota_image(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        self.call(
            "createOtaImage",
            vec![
                request.get("otaImageFilePath").into(),
                request.get("rawImageFilePath").into(),
                request.get("rawImageContent").into(),
            ],
        )
    }

    pub fn compare_files(&self, request: &BridgeRequest) -> Result<(), BridgeError> {
        self.call(
            "compareFiles",
            vec![request.get("file1").into(), request.get("file2").into()],
        )
    }

    /// Dispatches `operation` to the matching method.
    pub fn execute(
        &self,
        operation: BridgeOperation,
        request: &BridgeRequest,
    ) -> Result<(), BridgeError> {
        match operation {
            BridgeOperation::Start => self.start(request),
            BridgeOperation::Stop => self.stop(request),
            BridgeOperation::Reboot => self.reboot(request),
            BridgeOperation::FactoryReset => self.factory_reset(request),
            BridgeOperation::WaitForMessage => self.wait_for_message(request),
            BridgeOperation::CreateOtaImage => self.create_ota_image(request),
            BridgeOperation::CompareFiles => self.compare_files(request),
        }
    }
}
