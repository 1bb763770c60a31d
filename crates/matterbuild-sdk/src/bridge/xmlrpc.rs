//! Minimal XML-RPC encoding: method calls out, faults back.
//!
//! Only what the accessory server needs is covered. Successful responses are
//! not decoded since no bridge operation has a return value.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::Regex;

use super::BridgeError;

/// An XML-RPC parameter value. `Nil` uses the `<nil/>` extension.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlRpcValue {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Array(Vec<XmlRpcValue>),
    Struct(BTreeMap<String, XmlRpcValue>),
    Nil,
}

impl From<&str> for XmlRpcValue {
    fn from(value: &str) -> Self {
        XmlRpcValue::String(value.to_string())
    }
}

impl From<String> for XmlRpcValue {
    fn from(value: String) -> Self {
        XmlRpcValue::String(value)
    }
}

impl From<&serde_json::Value> for XmlRpcValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => XmlRpcValue::Nil,
            serde_json::Value::Bool(b) => XmlRpcValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => XmlRpcValue::Int(i),
                None => XmlRpcValue::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => XmlRpcValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                XmlRpcValue::Array(items.iter().map(XmlRpcValue::from).collect())
            }
            serde_json::Value::Object(map) => XmlRpcValue::Struct(
                map.iter()
                    .map(|(k, v)| (k.clone(), XmlRpcValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Option<&serde_json::Value>> for XmlRpcValue {
    fn from(value: Option<&serde_json::Value>) -> Self {
        value.map(XmlRpcValue::from).unwrap_or(XmlRpcValue::Nil)
    }
}

impl XmlRpcValue {
    fn write_xml(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            XmlRpcValue::Int(i) => {
                let _ = write!(out, "<int>{}</int>", i);
            }
            XmlRpcValue::Bool(b) => {
                let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
            }
            XmlRpcValue::Double(d) => {
                let _ = write!(out, "<double>{}</double>", d);
            }
            XmlRpcValue::String(s) => {
                let _ = write!(out, "<string>{}</string>", escape(s));
            }
            XmlRpcValue::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write_xml(out);
                }
                out.push_str("</data></array>");
            }
            XmlRpcValue::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    let _ = write!(out, "<member><name>{}</name>", escape(name));
                    value.write_xml(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
            XmlRpcValue::Nil => out.push_str("<nil/>"),
        }
        out.push_str("</value>");
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Serializes a `methodCall` document.
pub fn method_call(method: &str, params: &[XmlRpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    let _ = write!(out, "<methodName>{}</methodName><params>", escape(method));
    for param in params {
        out.push_str("<param>");
        param.write_xml(&mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

/// Turns a `<fault>` response into [`BridgeError::Fault`]; any other
/// `methodResponse` is accepted.
pub fn check_response(body: &str) -> Result<(), BridgeError> {
    if !body.contains("<methodResponse") {
        return Err(BridgeError::MalformedResponse(
            body.chars().take(200).collect(),
        ));
    }
    if !body.contains("<fault>") {
        return Ok(());
    }

    let code = Regex::new(r"<name>faultCode</name>\s*<value>\s*<(?:int|i4)>(-?\d+)</(?:int|i4)>")
        .ok()
        .and_then(|re| re.captures(body).and_then(|c| c[1].parse().ok()))
        .unwrap_or_default();
    let message = Regex::new(
        r"<name>faultString</name>\s*<value>\s*(?:<string>)?([^<]*)(?:</string>)?\s*</value>",
    )
    .ok()
    .and_then(|re| re.captures(body).map(|c| unescape(&c[1])))
    .unwrap_or_default();

    Err(BridgeError::Fault { code, message })
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_call_document() {
        let xml = method_call(
            "start",
            &[
                XmlRpcValue::from("default"),
                XmlRpcValue::Array(vec!["--discriminator".into(), "1234".into()]),
            ],
        );
        assert!(xml.starts_with("<?xml version=\"1.0\"?>"));
        assert!(xml.contains("<methodName>start</methodName>"));
        assert!(xml.contains(
            "<param><value><array><data><value><string>--discriminator</string></value>\
             <value><string>1234</string></value></data></array></value></param>"
        ));
    }

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(XmlRpcValue::Int(-3).to_xml(), "<value><int>-3</int></value>");
        assert_eq!(
            XmlRpcValue::Bool(true).to_xml(),
            "<value><boolean>1</boolean></value>"
        );
        assert_eq!(XmlRpcValue::Nil.to_xml(), "<value><nil/></value>");
        assert_eq!(
            XmlRpcValue::from("a<b & c").to_xml(),
            "<value><string>a&lt;b &amp; c</string></value>"
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(XmlRpcValue::from(&json!(5540)), XmlRpcValue::Int(5540));
        assert_eq!(XmlRpcValue::from(&json!(1.5)), XmlRpcValue::Double(1.5));
        assert_eq!(XmlRpcValue::from(&json!(null)), XmlRpcValue::Nil);
        assert_eq!(XmlRpcValue::from(None::<&serde_json::Value>), XmlRpcValue::Nil);
        assert_eq!(
            XmlRpcValue::from(&json!({"a": [true]})).to_xml(),
            "<value><struct><member><name>a</name><value><array><data>\
             <value><boolean>1</boolean></value></data></array></value></member></struct></value>"
        );
    }

    #[test]
    fn test_check_response_success() {
        let body = "<?xml version='1.0'?>\n<methodResponse>\n<params>\n<param>\n\
                    <value><nil/></value></param>\n</params>\n</methodResponse>\n";
        assert!(check_response(body).is_ok());
    }

    #[test]
    fn test_check_response_fault() {
        let body = r#"<?xml version='1.0'?>
<methodResponse>
<fault>
<value><struct>
<member>
<name>faultCode</name>
<value><int>1</int></value>
</member>
<member>
<name>faultString</name>
<value><string>&lt;class 'KeyError'&gt;:'default'</string></value>
</member>
</struct></value>
</fault>
</methodResponse>
"#;
        match check_response(body) {
            Err(BridgeError::Fault { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "<class 'KeyError'>:'default'");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_check_response_malformed() {
        assert!(matches!(
            check_response("<html>502 Bad Gateway</html>"),
            Err(BridgeError::MalformedResponse(_))
        ));
    }
}
