//! The tagged field-value model (spec §4.A): a small closed set of value
//! types, each carrying an error flag, with a one-byte-tag binary wire
//! format and value equality that ignores the error flag.

use std::io::{self, Read, Write};
use std::time::Duration;

/// The declared type of a field value. Immutable once a descriptor is
/// constructed (spec §3: "value_type ... immutable after construction").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Bool = 0,
    U32 = 1,
    I32 = 2,
    F64 = 3,
    String = 4,
    StringList = 5,
    Instant = 6,
}

impl ValueType {
    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ValueType::Bool,
            1 => ValueType::U32,
            2 => ValueType::I32,
            3 => ValueType::F64,
            4 => ValueType::String,
            5 => ValueType::StringList,
            6 => ValueType::Instant,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ValueData {
    Bool(bool),
    U32(u32),
    I32(i32),
    F64(f64),
    String(String),
    StringList(Vec<String>),
    Instant(Duration),
}

impl ValueData {
    fn value_type(&self) -> ValueType {
        match self {
            ValueData::Bool(_) => ValueType::Bool,
            ValueData::U32(_) => ValueType::U32,
            ValueData::I32(_) => ValueType::I32,
            ValueData::F64(_) => ValueType::F64,
            ValueData::String(_) => ValueType::String,
            ValueData::StringList(_) => ValueType::StringList,
            ValueData::Instant(_) => ValueType::Instant,
        }
    }

    fn default_for(t: ValueType) -> Self {
        match t {
            ValueType::Bool => ValueData::Bool(false),
            ValueType::U32 => ValueData::U32(0),
            ValueType::I32 => ValueData::I32(0),
            ValueType::F64 => ValueData::F64(0.0),
            ValueType::String => ValueData::String(String::new()),
            ValueType::StringList => ValueData::StringList(Vec::new()),
            ValueType::Instant => ValueData::Instant(Duration::ZERO),
        }
    }
}

/// Errors raised by the typed accessors and by [`Value::set`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("expected a {expected:?} value, field holds {actual:?}")]
    TypeMismatch { expected: ValueType, actual: ValueType },

    #[error("value stream is truncated or malformed: {0}")]
    Malformed(String),
}

/// A single field's current value: a typed payload plus an error flag.
///
/// Reading through a typed accessor while `is_error()` is true returns a
/// documented sentinel for that type rather than failing — only a tag
/// mismatch is an error. [`Value::set`] always clears the error flag.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    data: ValueData,
    error: bool,
}

impl Value {
    pub fn new_for_type(value_type: ValueType) -> Self {
        Self { data: ValueData::default_for(value_type), error: false }
    }

    pub fn value_type(&self) -> ValueType {
        self.data.value_type()
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self, error: bool) {
        self.error = error;
    }

    fn set_typed(&mut self, data: ValueData) -> Result<(), ValueError> {
        let expected = self.data.value_type();
        let actual = data.value_type();
        if expected != actual {
            return Err(ValueError::TypeMismatch { expected, actual });
        }
        self.data = data;
        self.error = false;
        Ok(())
    }

    pub fn set_bool(&mut self, v: bool) -> Result<(), ValueError> {
        self.set_typed(ValueData::Bool(v))
    }

    pub fn set_u32(&mut self, v: u32) -> Result<(), ValueError> {
        self.set_typed(ValueData::U32(v))
    }

    pub fn set_i32(&mut self, v: i32) -> Result<(), ValueError> {
        self.set_typed(ValueData::I32(v))
    }

    pub fn set_f64(&mut self, v: f64) -> Result<(), ValueError> {
        self.set_typed(ValueData::F64(v))
    }

    pub fn set_string(&mut self, v: impl Into<String>) -> Result<(), ValueError> {
        self.set_typed(ValueData::String(v.into()))
    }

    pub fn set_string_list(&mut self, v: Vec<String>) -> Result<(), ValueError> {
        self.set_typed(ValueData::StringList(v))
    }

    pub fn set_instant(&mut self, v: Duration) -> Result<(), ValueError> {
        self.set_typed(ValueData::Instant(v))
    }

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match &self.data {
            ValueData::Bool(b) => Ok(!self.error && *b),
            other => Err(mismatch(ValueType::Bool, other.value_type())),
        }
    }

    pub fn as_u32(&self) -> Result<u32, ValueError> {
        match &self.data {
            ValueData::U32(v) => Ok(if self.error { 0 } else { *v }),
            other => Err(mismatch(ValueType::U32, other.value_type())),
        }
    }

    pub fn as_i32(&self) -> Result<i32, ValueError> {
        match &self.data {
            ValueData::I32(v) => Ok(if self.error { 0 } else { *v }),
            other => Err(mismatch(ValueType::I32, other.value_type())),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ValueError> {
        match &self.data {
            ValueData::F64(v) => Ok(if self.error { 0.0 } else { *v }),
            other => Err(mismatch(ValueType::F64, other.value_type())),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match &self.data {
            ValueData::String(v) => Ok(if self.error { "" } else { v.as_str() }),
            other => Err(mismatch(ValueType::String, other.value_type())),
        }
    }

    pub fn as_string_list(&self) -> Result<&[String], ValueError> {
        match &self.data {
            ValueData::StringList(v) => Ok(if self.error { &[] } else { v.as_slice() }),
            other => Err(mismatch(ValueType::StringList, other.value_type())),
        }
    }

    pub fn as_instant(&self) -> Result<Duration, ValueError> {
        match &self.data {
            ValueData::Instant(v) => Ok(if self.error { Duration::ZERO } else { *v }),
            other => Err(mismatch(ValueType::Instant, other.value_type())),
        }
    }

    /// Formats the current value as text, for `PatternFormat` substitution
    /// and other display purposes. Error values format to an empty string,
    /// matching the sentinel returned by the typed accessors.
    pub fn format_text(&self) -> String {
        if self.error {
            return String::new();
        }
        match &self.data {
            ValueData::Bool(b) => b.to_string(),
            ValueData::U32(v) => v.to_string(),
            ValueData::I32(v) => v.to_string(),
            ValueData::F64(v) => v.to_string(),
            ValueData::String(v) => v.clone(),
            ValueData::StringList(v) => v.join(","),
            ValueData::Instant(v) => v.as_secs().to_string(),
        }
    }

    /// Value equality, ignoring the error flag (spec §3: "Values are
    /// equality-comparable ... Equality is value equality ignoring the
    /// error flag").
    pub fn equals(&self, other: &Value) -> bool {
        self.data == other.data
    }

    pub fn stream_out<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[self.data.value_type() as u8])?;
        w.write_all(&[self.error as u8])?;
        match &self.data {
            ValueData::Bool(v) => w.write_all(&[*v as u8]),
            ValueData::U32(v) => w.write_all(&v.to_le_bytes()),
            ValueData::I32(v) => w.write_all(&v.to_le_bytes()),
            ValueData::F64(v) => w.write_all(&v.to_le_bytes()),
            ValueData::String(v) => write_str(w, v),
            ValueData::StringList(v) => {
                w.write_all(&(v.len() as u32).to_le_bytes())?;
                for s in v {
                    write_str(w, s)?;
                }
                Ok(())
            }
            ValueData::Instant(v) => {
                w.write_all(&v.as_secs().to_le_bytes())?;
                w.write_all(&v.subsec_nanos().to_le_bytes())
            }
        }
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<Value, ValueError> {
        let tag = read_u8(r)?;
        let value_type = ValueType::from_tag(tag)
            .ok_or_else(|| ValueError::Malformed(format!("unknown value tag {tag}")))?;
        let error = read_u8(r)? != 0;
        let data = match value_type {
            ValueType::Bool => ValueData::Bool(read_u8(r)? != 0),
            ValueType::U32 => ValueData::U32(u32::from_le_bytes(read_n(r)?)),
            ValueType::I32 => ValueData::I32(i32::from_le_bytes(read_n(r)?)),
            ValueType::F64 => ValueData::F64(f64::from_le_bytes(read_n(r)?)),
            ValueType::String => ValueData::String(read_str(r)?),
            ValueType::StringList => {
                let count = u32::from_le_bytes(read_n(r)?);
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(read_str(r)?);
                }
                ValueData::StringList(items)
            }
            ValueType::Instant => {
                let secs = u64::from_le_bytes(read_n(r)?);
                let nanos = u32::from_le_bytes(read_n(r)?);
                ValueData::Instant(Duration::new(secs, nanos))
            }
        };
        Ok(Value { data, error })
    }
}

fn mismatch(expected: ValueType, actual: ValueType) -> ValueError {
    ValueError::TypeMismatch { expected, actual }
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_str<R: Read>(r: &mut R) -> Result<String, ValueError> {
    let len = u32::from_le_bytes(read_n(r)?) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(|e| ValueError::Malformed(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| ValueError::Malformed(e.to_string()))
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, ValueError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|e| ValueError::Malformed(e.to_string()))?;
    Ok(buf[0])
}

fn read_n<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N], ValueError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|e| ValueError::Malformed(e.to_string()))?;
    Ok(buf)
}
