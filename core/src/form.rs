//! Form payloads and their conversion to plain objects.
//!
//! [`FormData`] is an ordered, multi-valued list of fields, the way a browser
//! form submits them. [`FormObject`] is the flat object view of the same data:
//! one entry per field name, holding either the single value or every value
//! in submission order.
//!
//! Only flat keys are supported. Nested arrays and objects are flattened to
//! text on the way in and never reconstructed.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

/// Binary form value, e.g. an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: None,
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }
}

/// A single form value: text or a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Blob(Blob),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::Blob(_) => None,
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

impl From<Blob> for FormValue {
    fn from(value: Blob) -> Self {
        FormValue::Blob(value)
    }
}

macro_rules! form_value_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FormValue {
                fn from(value: $t) -> Self {
                    FormValue::Text(value.to_string())
                }
            }
        )*
    };
}

form_value_from_number!(i32, i64, u32, u64, f64);

/// Ordered multi-valued form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`. Existing values under the same name are kept.
    pub fn append(&mut self, name: &str, value: impl Into<FormValue>) {
        self.entries.push((name.to_string(), value.into()));
    }

    /// First value under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Every value under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.entries
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    /// Distinct field names in first-encounter order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    pub fn entries(&self) -> &[(String, FormValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand an object back into form fields: `Many` yields one entry per
    /// element, `Single` yields one entry.
    pub fn from_object(object: &FormObject) -> Self {
        let mut form = FormData::new();
        for (name, field) in object.iter() {
            match field {
                FormField::Single(value) => form.append(name, value.clone()),
                FormField::Many(values) => {
                    for value in values {
                        form.append(name, value.clone());
                    }
                }
            }
        }
        form
    }

    /// Render as a `multipart/form-data` body delimited by `boundary`.
    pub fn encode_multipart(&self, boundary: &str) -> Bytes {
        let mut out = BytesMut::new();
        for (name, value) in &self.entries {
            out.put_slice(format!("--{boundary}\r\n").as_bytes());
            match value {
                FormValue::Text(text) => {
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    out.put_slice(text.as_bytes());
                }
                FormValue::Blob(blob) => {
                    let filename = blob.filename.as_deref().unwrap_or("blob");
                    let content_type = blob
                        .content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream");
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(filename)
                        )
                        .as_bytes(),
                    );
                    out.put_slice(&blob.bytes);
                }
            }
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("--{boundary}--\r\n").as_bytes());
        out.freeze()
    }
}

// Field names and filenames are percent-escaped the way browsers do it.
fn escape_quoted(s: &str) -> String {
    s.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// A form field as seen from the object side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Single(FormValue),
    Many(Vec<FormValue>),
}

macro_rules! form_field_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FormField {
                fn from(value: $t) -> Self {
                    FormField::Single(value.into())
                }
            }

            impl From<Vec<$t>> for FormField {
                fn from(values: Vec<$t>) -> Self {
                    FormField::Many(values.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

form_field_from!(FormValue, &str, String, Blob, i32, i64, u32, u64, f64);

/// Flat object view of a form. Keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormObject {
    fields: Vec<(String, FormField)>,
}

impl FormObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing an existing field in place.
    pub fn insert(&mut self, name: &str, field: impl Into<FormField>) {
        let field = field.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name.to_string(), field)),
        }
    }

    /// Builder-style [`FormObject::insert`].
    pub fn with(mut self, name: &str, field: impl Into<FormField>) -> Self {
        self.insert(name, field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormField)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Collapse form fields into an object. A name with one value maps to
    /// `Single`; a name with several maps to `Many` in insertion order.
    pub fn from_form_data(form: &FormData) -> Self {
        let mut object = FormObject::new();
        for name in form.keys() {
            let mut values: Vec<FormValue> = form.get_all(name).into_iter().cloned().collect();
            let field = if values.len() == 1 {
                FormField::Single(values.remove(0))
            } else {
                FormField::Many(values)
            };
            object.fields.push((name.to_string(), field));
        }
        object
    }

    /// Best-effort conversion from a JSON object. Non-string scalars are
    /// stringified; arrays become `Many`; anything nested deeper is rendered
    /// as compact JSON text. Non-object input yields an empty object.
    pub fn from_json(value: &Value) -> Self {
        let mut object = FormObject::new();
        if let Value::Object(map) = value {
            for (name, v) in map {
                let field = match v {
                    Value::Array(items) => {
                        FormField::Many(items.iter().map(scalar_to_form_value).collect())
                    }
                    other => FormField::Single(scalar_to_form_value(other)),
                };
                object.insert(name, field);
            }
        }
        object
    }

    /// Render as a JSON object. Blobs are represented by their filename.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, field) in &self.fields {
            let v = match field {
                FormField::Single(value) => form_value_to_json(value),
                FormField::Many(values) => {
                    Value::Array(values.iter().map(form_value_to_json).collect())
                }
            };
            map.insert(name.clone(), v);
        }
        Value::Object(map)
    }
}

fn scalar_to_form_value(value: &Value) -> FormValue {
    match value {
        Value::String(s) => FormValue::Text(s.clone()),
        other => FormValue::Text(other.to_string()),
    }
}

fn form_value_to_json(value: &FormValue) -> Value {
    match value {
        FormValue::Text(s) => Value::String(s.clone()),
        FormValue::Blob(blob) => Value::String(blob.filename.clone().unwrap_or_default()),
    }
}
