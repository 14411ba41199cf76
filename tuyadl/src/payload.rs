use crate::{
    error::{Error, Result},
    region::Region,
};
use base64::Engine;
use serde_json::Value;
use std::fmt;

/// Platform credentials as header pairs.
///
/// Never read by the pipeline itself, only handed to the api collaborator.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials(Vec<(String, String)>);

impl Credentials {
    pub fn new(headers: Vec<(String, String)>) -> Self {
        Self(headers)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(k, _)| format!("{}: <redacted>", k)))
            .finish()
    }
}

/// First file of a decoded event payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub bucket: String,
    pub file_path: String,
    pub key: String,
}

impl Payload {
    /// Decode a raw event payload.
    ///
    /// `input` is either a JSON object or base64 encoded JSON of the shape
    /// `{"bucket": "...", "files": [["/path", "key"], ...]}`.
    pub fn decode(input: &str) -> Result<Self> {
        let input = input.trim();

        let value = if input.starts_with('{') {
            serde_json::from_str::<Value>(input)
                .map_err(|e| Error::invalid_payload(format!("invalid JSON: {}", e)))?
        } else {
            let bytes = decode_base64(input)?;
            serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                Error::invalid_payload(format!("base64 content is not valid JSON: {}", e))
            })?
        };

        Self::from_value(&value)
    }

    /// Extract the first file entry of an already structured payload.
    pub fn from_value(value: &Value) -> Result<Self> {
        let files = value
            .get("files")
            .and_then(Value::as_array)
            .filter(|x| !x.is_empty())
            .ok_or_else(|| Error::invalid_payload(format!("missing 'files' array in {}", value)))?;

        let entry = files[0]
            .as_array()
            .filter(|x| x.len() >= 2)
            .ok_or_else(|| Error::invalid_payload(format!("invalid file entry {}", files[0])))?;

        let file_path = entry[0]
            .as_str()
            .ok_or_else(|| {
                Error::invalid_payload(format!("file path must be a string, found {}", entry[0]))
            })?
            .to_owned();
        let key = coerce_key(&entry[1])?;

        let bucket = value
            .get("bucket")
            .and_then(Value::as_str)
            .filter(|x| !x.is_empty())
            .ok_or_else(|| Error::invalid_payload("missing 'bucket'"))?
            .to_owned();

        if file_path.is_empty() {
            return Err(Error::invalid_payload("file path is empty"));
        }

        Ok(Self {
            bucket,
            file_path,
            key,
        })
    }
}

/// Keys are used as the UTF-8 bytes of their string form, so non-string scalars are
/// stringified first (`1234` becomes `"1234"`).
fn coerce_key(value: &Value) -> Result<String> {
    Ok(match value {
        Value::String(x) => x.to_owned(),
        Value::Number(x) => match x.as_f64() {
            Some(x) => number_to_string(x),
            None => x.to_string(),
        },
        Value::Bool(x) => x.to_string(),
        Value::Null => "null".to_owned(),
        x => {
            return Err(Error::invalid_payload(format!(
                "file key must be a scalar, found {}",
                x
            )));
        }
    })
}

/// Number formatting of JavaScript's `String(n)`.
///
/// Every number is a double first, so integers above 2^53 lose digits. Integral values
/// print without a fraction and exponents are only used outside `[1e-6, 1e21)`.
fn number_to_string(x: f64) -> String {
    if x == 0.0 {
        return "0".to_owned();
    }

    let abs = x.abs();

    if (1e-6..1e21).contains(&abs) {
        return x.to_string();
    }

    let text = format!("{:e}", x);

    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => text,
    }
}

fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let compact = input
        .chars()
        .filter(|x| !x.is_ascii_whitespace())
        .collect::<String>();

    base64::engine::general_purpose::STANDARD
        .decode(&compact)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(&compact))
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(&compact))
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&compact))
        .map_err(|e| Error::invalid_payload(format!("neither JSON nor base64: {}", e)))
}

/// Everything needed to locate and decrypt one media file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaReference {
    pub bucket: String,
    /// As found in the payload, possibly with a leading `/`.
    pub file_path: String,
    pub key: Vec<u8>,
    pub device_id: String,
    pub region: Region,
    pub credentials: Credentials,
}

impl MediaReference {
    pub fn new(payload: Payload, device_id: String, region: Region, credentials: Credentials) -> Self {
        Self {
            bucket: payload.bucket,
            file_path: payload.file_path,
            key: payload.key.into_bytes(),
            device_id,
            region,
            credentials,
        }
    }

    /// Last path segment, handy as an output file name.
    ///
    /// Both `/` and `\` separate segments, and `.` or `..` never count as a name.
    pub fn file_name(&self) -> Option<&str> {
        self.file_path
            .rsplit(['/', '\\'])
            .next()
            .filter(|x| !x.is_empty() && *x != "." && *x != "..")
    }
}
